//! 连接策略选择规则
//!
//! 有等值条件的连接选归并策略并给两侧登记排序要求；
//! 两侧都能把排序下推给源时用增强归并。嵌套表策略在建树时
//! 已经定下，这里不再改动；没有等值条件的保持嵌套循环。

use crate::core::error::CompileResult;
use crate::core::expression::Expression;
use crate::query::command::OrderByItem;
use crate::query::metadata::Capability;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::{JoinStrategy, RelNode};

#[derive(Debug)]
pub struct ChooseJoinStrategyRule;

impl OptimizerRule for ChooseJoinStrategyRule {
    fn id(&self) -> RuleId {
        RuleId::ChooseJoinStrategy
    }

    fn execute(&self, root: RelNode, ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        let caps = ctx.env.capabilities.clone();
        root.transform(&mut |node| {
            let mut join = match node {
                RelNode::Join(j) => j,
                other => return Ok(other),
            };

            if join.strategy == JoinStrategy::NestedTable {
                return Ok(RelNode::Join(join));
            }

            let mut left_items = Vec::new();
            let mut right_items = Vec::new();
            for eq in join.equality_criteria() {
                if let Expression::Binary { left, right, .. } = eq {
                    left_items.push(OrderByItem {
                        expr: (**left).clone(),
                        ascending: true,
                    });
                    right_items.push(OrderByItem {
                        expr: (**right).clone(),
                        ascending: true,
                    });
                }
            }

            if left_items.is_empty() {
                join.strategy = JoinStrategy::NestedLoop;
                return Ok(RelNode::Join(join));
            }

            let side_sortable = |side: &RelNode| match side {
                RelNode::Access(a) => a
                    .model
                    .as_deref()
                    .map(|m| caps.supports(m, Capability::OrderBy))
                    .unwrap_or(false),
                _ => false,
            };
            let enhanced = side_sortable(join.left.as_ref()) && side_sortable(join.right.as_ref());

            join.strategy = if enhanced {
                JoinStrategy::EnhancedMerge
            } else {
                JoinStrategy::Merge
            };
            join.left_sort = Some(left_items);
            join.right_sort = Some(right_items);
            Ok(RelNode::Join(join))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol::{ElementSymbol, GroupSymbol};
    use crate::core::value::DataType;
    use crate::query::command::JoinType;
    use crate::query::planner::plan::nodes::{JoinNode, SourceNode};

    fn ctx_and_run(join: JoinNode) -> RelNode {
        let mut env = crate::query::test_support::env_with_table(
            "g1",
            "source1",
            vec![("a", DataType::Integer)],
        );
        let hints = crate::query::planner::hints::PlanHints::new();
        let mut stack = crate::query::optimizer::RuleStack::new();
        let mut ctx = RuleContext {
            env: &mut env,
            stack: &mut stack,
            hints: &hints,
        };
        ChooseJoinStrategyRule
            .execute(join.into_node(), &mut ctx)
            .unwrap()
    }

    #[test]
    fn test_equality_join_gets_merge_with_sorts() {
        let a = ElementSymbol::with_group("g1.a", GroupSymbol::new("g1"), DataType::Integer);
        let b = ElementSymbol::with_group("g2.b", GroupSymbol::new("g2"), DataType::Integer);
        let join = JoinNode::new(
            JoinType::Inner,
            SourceNode::for_group(GroupSymbol::new("g1")).into_node(),
            SourceNode::for_group(GroupSymbol::new("g2")).into_node(),
        )
        .with_criteria(vec![Expression::eq(
            Expression::Element(a),
            Expression::Element(b),
        )]);

        if let RelNode::Join(j) = ctx_and_run(join) {
            assert_eq!(j.strategy, JoinStrategy::Merge);
            assert!(j.left_sort.is_some());
            assert!(j.right_sort.is_some());
        } else {
            panic!("应当仍是连接");
        }
    }

    #[test]
    fn test_no_equality_stays_nested_loop() {
        let join = JoinNode::new(
            JoinType::Cross,
            SourceNode::for_group(GroupSymbol::new("g1")).into_node(),
            SourceNode::for_group(GroupSymbol::new("g2")).into_node(),
        );
        if let RelNode::Join(j) = ctx_and_run(join) {
            assert_eq!(j.strategy, JoinStrategy::NestedLoop);
        } else {
            panic!("应当仍是连接");
        }
    }
}
