//! 聚合下推规则
//!
//! 访问上提之后仍留在访问之上的分组节点，若源支持聚合，
//! 沉入访问节点内执行。

use crate::core::error::CompileResult;
use crate::query::metadata::Capability;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::RelNode;

#[derive(Debug)]
pub struct PushAggregatesRule;

impl OptimizerRule for PushAggregatesRule {
    fn id(&self) -> RuleId {
        RuleId::PushAggregates
    }

    fn execute(&self, root: RelNode, ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        let caps = ctx.env.capabilities.clone();
        root.transform(&mut |node| {
            let mut group = match node {
                RelNode::Group(g) => g,
                other => return Ok(other),
            };

            let supported = match group.child.as_deref() {
                Some(RelNode::Access(a)) if !a.is_subplan() && a.command.is_none() => a
                    .model
                    .as_deref()
                    .map(|m| caps.supports(m, Capability::Aggregates))
                    .unwrap_or(false),
                _ => false,
            };
            if !supported {
                return Ok(RelNode::Group(group));
            }

            log::debug!("聚合下沉入访问节点");
            let mut access = match *group.child.take().unwrap() {
                RelNode::Access(a) => a,
                _ => unreachable!(),
            };
            let inner = access.child.take().map(|b| *b);
            group.child = inner.map(Box::new);
            let output = group.output_cols().to_vec();
            access.child = Some(Box::new(group.into_node()));
            if !output.is_empty() {
                access.set_output_cols(output);
            }
            Ok(RelNode::Access(access))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::{AggregateFunction, Expression};
    use crate::core::symbol::{ElementSymbol, GroupSymbol};
    use crate::core::value::DataType;
    use crate::query::command::SelectItem;
    use crate::query::planner::plan::nodes::{AccessNode, GroupNode, SourceNode};

    #[test]
    fn test_group_sinks_into_access() {
        let access = AccessNode::new(
            Some("source1".to_string()),
            Some(SourceNode::for_group(GroupSymbol::new("g1")).into_node()),
        );
        let agg_sym = ElementSymbol::new("cnt", DataType::Long);
        let group = GroupNode::new(
            vec![],
            vec![SelectItem::new(
                Expression::Aggregate {
                    func: AggregateFunction::Count,
                    arg: None,
                    distinct: false,
                },
                agg_sym,
            )],
            Some(access.into_node()),
        );

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

        let out = PushAggregatesRule
            .execute(group.into_node(), &mut ctx)
            .unwrap();
        assert!(matches!(out, RelNode::Access(_)));
        if let RelNode::Access(a) = &out {
            assert!(matches!(a.child.as_deref(), Some(RelNode::Group(_))));
        }
    }
}
