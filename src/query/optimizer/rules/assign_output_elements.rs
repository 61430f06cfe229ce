//! 输出列分配规则
//!
//! 自底向上传播每个节点的输出列：投影/分组节点决定自己的输出，
//! 连接拼接两侧，集合运算取左侧，其余节点透传子节点的输出。

use crate::core::error::CompileResult;
use crate::core::symbol::ElementSymbol;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::RelNode;

#[derive(Debug)]
pub struct AssignOutputElementsRule;

impl OptimizerRule for AssignOutputElementsRule {
    fn id(&self) -> RuleId {
        RuleId::AssignOutputElements
    }

    fn execute(&self, mut root: RelNode, _ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        assign(&mut root);
        Ok(root)
    }
}

fn assign(node: &mut RelNode) {
    for child in node.children_mut() {
        assign(child);
    }

    let computed: Option<Vec<ElementSymbol>> = match node {
        RelNode::Project(n) => Some(n.cols.iter().map(|i| i.symbol.clone()).collect()),
        RelNode::Group(n) => {
            let mut out: Vec<ElementSymbol> = n
                .group_cols
                .iter()
                .filter_map(|e| e.as_element().cloned())
                .collect();
            out.extend(n.aggregates.iter().map(|i| i.symbol.clone()));
            Some(out)
        }
        RelNode::Join(n) => {
            let mut out = n.left.output_cols().to_vec();
            out.extend(n.right.output_cols().to_vec());
            Some(out)
        }
        RelNode::SetOp(n) => Some(n.left.output_cols().to_vec()),
        // 虚拟来源在建树时已拿到外层列
        RelNode::Source(n) if n.is_virtual() => None,
        _ => {
            let inherited = node
                .children()
                .first()
                .map(|c| c.output_cols().to_vec());
            inherited.filter(|cols| !cols.is_empty())
        }
    };

    if let Some(cols) = computed {
        if !cols.is_empty() {
            node.set_output_cols(cols);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::Expression;
    use crate::core::symbol::GroupSymbol;
    use crate::core::value::DataType;
    use crate::query::command::SelectItem;
    use crate::query::planner::plan::nodes::{ProjectNode, SelectNode, SourceNode};

    #[test]
    fn test_select_inherits_project_output() {
        let g = GroupSymbol::new("pm1.g1");
        let sym = ElementSymbol::with_group("pm1.g1.a", g.clone(), DataType::Integer);
        let project = ProjectNode::new(
            vec![SelectItem::new(Expression::Element(sym.clone()), sym.clone())],
            Some(SourceNode::for_group(g).into_node()),
        );
        let mut tree = SelectNode::new(Expression::TRUE, Some(project.into_node())).into_node();

        assign(&mut tree);
        assert_eq!(tree.output_cols(), &[sym]);
    }
}
