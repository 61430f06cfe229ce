//! 虚拟组合并规则
//!
//! 把可合并的虚拟来源层折叠掉：来源节点下挂着内层投影时，
//! 直接用符号映射重建一个以外层符号命名的投影，消去中间层。
//! 不透明子计划与表值函数来源不参与合并。

use crate::core::error::CompileResult;
use crate::query::command::SelectItem;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::{ProjectNode, RelNode};

#[derive(Debug)]
pub struct MergeVirtualRule;

impl OptimizerRule for MergeVirtualRule {
    fn id(&self) -> RuleId {
        RuleId::MergeVirtual
    }

    fn execute(&self, root: RelNode, _ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        root.transform(&mut |node| Ok(merge_one(node)))
    }
}

fn merge_one(node: RelNode) -> RelNode {
    let source = match node {
        RelNode::Source(s) => s,
        other => return other,
    };

    let map = match &source.symbol_map {
        Some(m) => m.clone(),
        None => return RelNode::Source(source),
    };
    if source.table_function.is_some() || source.command.is_some() {
        return RelNode::Source(source);
    }

    let inner_project = match source.child.as_deref() {
        Some(RelNode::Project(p)) if p.into_target.is_none() => p,
        _ => return RelNode::Source(source),
    };

    // 外层符号 + 内层表达式重建投影；中间虚拟层消失
    let mut cols = Vec::new();
    for (outer, inner) in map.entries() {
        let symbol = match outer.as_element() {
            Some(sym) => sym.clone(),
            None => return RelNode::Source(source),
        };
        cols.push(SelectItem::new(inner.clone(), symbol));
    }

    let inner_child = inner_project.child.as_deref().cloned();
    let mut merged = ProjectNode::new(cols, inner_child);
    merged.set_id(source.id());
    merged.set_output_cols(source.output_cols().to_vec());
    if let Some(child) = &merged.child {
        merged.set_groups(child.groups().to_vec());
    }
    log::debug!(
        "合并虚拟组 {}",
        source
            .group
            .as_ref()
            .map(|g| g.name())
            .unwrap_or("<anonymous>")
    );
    merged.into_node()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::Expression;
    use crate::core::symbol::{ElementSymbol, GroupSymbol, SymbolMap};
    use crate::core::value::DataType;
    use crate::query::planner::plan::nodes::SourceNode;
    use crate::query::planner::plan::NodeMask;

    #[test]
    fn test_virtual_layer_collapsed() {
        let base = GroupSymbol::new("pm1.g1");
        let inner_sym =
            ElementSymbol::with_group("pm1.g1.a", base.clone(), DataType::Integer);
        let inner_project = ProjectNode::new(
            vec![SelectItem::new(
                Expression::Element(inner_sym.clone()),
                inner_sym.clone(),
            )],
            Some(SourceNode::for_group(base).into_node()),
        );

        let view = GroupSymbol::virtual_group("v1");
        let outer_sym = ElementSymbol::with_group("v1.x", view.clone(), DataType::Integer);
        let mut map = SymbolMap::new();
        map.insert(
            Expression::Element(outer_sym.clone()),
            Expression::Element(inner_sym),
        );

        let mut source = SourceNode::for_group(view);
        source.symbol_map = Some(map);
        source.set_output_cols(vec![outer_sym.clone()]);
        source.set_child(inner_project.into_node());

        let out = merge_one(source.into_node());
        match &out {
            RelNode::Project(p) => {
                assert_eq!(p.cols[0].symbol, outer_sym);
            }
            other => panic!("应当折叠为投影: {:?}", other),
        }
        // 虚拟来源消失
        assert!(out.find_nodes(NodeMask::SOURCE).len() == 1);
    }
}
