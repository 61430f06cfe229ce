//! 条件下推规则
//!
//! 把选择节点朝来源方向移动：内连接只引用一侧组的条件沉到
//! 该侧之下，虚拟来源上的条件经符号映射改写后穿透到内层。
//! 反复应用直到一轮内没有变化。条件回推规则在连接规划之后
//! 复用同一套下推逻辑。

use crate::core::error::CompileResult;
use crate::core::expression::criteria::references_only;
use crate::query::command::JoinType;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::{RelNode, SelectNode};

#[derive(Debug)]
pub struct PushSelectCriteriaRule;

impl OptimizerRule for PushSelectCriteriaRule {
    fn id(&self) -> RuleId {
        RuleId::PushSelectCriteria
    }

    fn execute(&self, root: RelNode, _ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        push_to_fixpoint(root)
    }
}

/// 条件回推：连接规划后把仍然悬着的条件再推一轮
#[derive(Debug)]
pub struct PushBackCriteriaRule;

impl OptimizerRule for PushBackCriteriaRule {
    fn id(&self) -> RuleId {
        RuleId::PushBackCriteria
    }

    fn execute(&self, root: RelNode, _ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        push_to_fixpoint(root)
    }
}

pub(crate) fn push_to_fixpoint(mut root: RelNode) -> CompileResult<RelNode> {
    // 每轮至少消去一层可下推的选择；轮数以树大小为界
    let max_rounds = root.count_nodes() + 1;
    for _ in 0..max_rounds {
        let mut changed = false;
        root = root.transform(&mut |node| Ok(push_one(node, &mut changed)))?;
        if !changed {
            break;
        }
    }
    Ok(root)
}

fn push_one(node: RelNode, changed: &mut bool) -> RelNode {
    let select = match node {
        RelNode::Select(s) => s,
        other => return other,
    };

    // HAVING 条件不能越过分组节点
    if select.is_having {
        return RelNode::Select(select);
    }
    // 含子查询的条件悬在原位，由转换器按相关性处理
    if select.criteria.has_subquery() {
        return RelNode::Select(select);
    }

    let child = match &select.child {
        Some(c) => c.as_ref(),
        None => return RelNode::Select(select),
    };

    match child {
        RelNode::Join(join) if matches!(join.join_type, JoinType::Inner | JoinType::Cross) => {
            let left_groups = join.left.group_names();
            let right_groups = join.right.group_names();

            if references_only(&select.criteria, &left_groups) {
                *changed = true;
                let mut select = select;
                let mut join = match *select.child.take().unwrap() {
                    RelNode::Join(j) => j,
                    _ => unreachable!(),
                };
                let left = std::mem::replace(
                    &mut join.left,
                    Box::new(
                        crate::query::planner::plan::nodes::NullNode::new().into_node(),
                    ),
                );
                let mut pushed = SelectNode::new(select.criteria.clone(), Some(*left));
                pushed.set_id(select.id());
                pushed.set_groups(select.groups().to_vec());
                join.left = Box::new(pushed.into_node());
                RelNode::Join(join)
            } else if references_only(&select.criteria, &right_groups) {
                *changed = true;
                let mut select = select;
                let mut join = match *select.child.take().unwrap() {
                    RelNode::Join(j) => j,
                    _ => unreachable!(),
                };
                let right = std::mem::replace(
                    &mut join.right,
                    Box::new(
                        crate::query::planner::plan::nodes::NullNode::new().into_node(),
                    ),
                );
                let mut pushed = SelectNode::new(select.criteria.clone(), Some(*right));
                pushed.set_id(select.id());
                pushed.set_groups(select.groups().to_vec());
                join.right = Box::new(pushed.into_node());
                RelNode::Join(join)
            } else {
                RelNode::Select(select)
            }
        }
        RelNode::Source(source)
            if source.is_virtual()
                && source.child.is_some()
                && !matches!(
                    source.child.as_deref(),
                    Some(RelNode::Access(a)) if a.is_subplan()
                ) =>
        {
            // 经符号映射改写后穿透虚拟层
            let map = source.symbol_map.clone().unwrap_or_default();
            let rewritten = map.apply(&select.criteria);
            // 映射没有覆盖全部引用时放弃下推
            let covered = rewritten
                .elements()
                .iter()
                .all(|e| e.group().map(|g| !g.is_virtual()).unwrap_or(true));
            if !covered {
                return RelNode::Select(select);
            }

            *changed = true;
            let mut select = select;
            let mut source = match *select.child.take().unwrap() {
                RelNode::Source(s) => s,
                _ => unreachable!(),
            };
            let inner = source.child.take().map(|b| *b);
            let mut pushed = SelectNode::new(rewritten, inner);
            pushed.set_id(select.id());
            source.set_child(pushed.into_node());
            RelNode::Source(source)
        }
        _ => RelNode::Select(select),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::Expression;
    use crate::core::symbol::{ElementSymbol, GroupSymbol};
    use crate::core::value::{DataType, Value};
    use crate::query::planner::plan::nodes::{JoinNode, SourceNode};
    use crate::query::planner::plan::NodeMask;

    fn col(group: &str, name: &str) -> Expression {
        Expression::Element(ElementSymbol::with_group(
            format!("{}.{}", group, name),
            GroupSymbol::new(group),
            DataType::Integer,
        ))
    }

    #[test]
    fn test_one_sided_criteria_pushed_below_join() {
        let join = JoinNode::new(
            JoinType::Inner,
            SourceNode::for_group(GroupSymbol::new("g1")).into_node(),
            SourceNode::for_group(GroupSymbol::new("g2")).into_node(),
        );
        let criteria = Expression::eq(col("g1", "a"), Expression::Constant(Value::Integer(1)));
        let mut select = SelectNode::new(criteria, Some(join.into_node()));
        select.add_group(GroupSymbol::new("g1"));

        let out = push_to_fixpoint(select.into_node()).unwrap();
        // 根变成连接，选择沉到左侧之下
        assert!(matches!(out, RelNode::Join(_)));
        if let RelNode::Join(j) = &out {
            assert!(matches!(j.left.as_ref(), RelNode::Select(_)));
            assert!(matches!(j.right.as_ref(), RelNode::Source(_)));
        }
    }

    #[test]
    fn test_two_sided_criteria_stays() {
        let join = JoinNode::new(
            JoinType::Inner,
            SourceNode::for_group(GroupSymbol::new("g1")).into_node(),
            SourceNode::for_group(GroupSymbol::new("g2")).into_node(),
        );
        let criteria = Expression::eq(col("g1", "a"), col("g2", "b"));
        let select = SelectNode::new(criteria, Some(join.into_node()));

        let out = push_to_fixpoint(select.into_node()).unwrap();
        assert!(matches!(out, RelNode::Select(_)));
    }

    #[test]
    fn test_criteria_pierces_virtual_source() {
        let inner_col = col("pm1.g1", "a");
        let outer_group = GroupSymbol::virtual_group("v1");
        let outer_sym =
            ElementSymbol::with_group("v1.x", outer_group.clone(), DataType::Integer);

        let mut map = crate::core::symbol::SymbolMap::new();
        map.insert(Expression::Element(outer_sym.clone()), inner_col.clone());

        let mut source = SourceNode::for_group(outer_group);
        source.symbol_map = Some(map);
        source.set_child(SourceNode::for_group(GroupSymbol::new("pm1.g1")).into_node());

        let criteria = Expression::eq(
            Expression::Element(outer_sym),
            Expression::Constant(Value::Integer(3)),
        );
        let select = SelectNode::new(criteria, Some(source.into_node()));

        let out = push_to_fixpoint(select.into_node()).unwrap();
        assert!(matches!(out, RelNode::Source(_)));
        let selects = out.find_nodes(NodeMask::SELECT);
        assert_eq!(selects.len(), 1);
        if let RelNode::Select(s) = selects[0] {
            // 条件被改写到内层列
            assert_eq!(s.criteria, Expression::eq(inner_col, Expression::Constant(Value::Integer(3))));
        }
    }
}
