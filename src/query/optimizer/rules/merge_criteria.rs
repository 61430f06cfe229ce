//! 条件归并规则
//!
//! 把相邻的选择节点链并成单个节点，合取项去重。
//! 在来源收拢之前运行，减少下推命令里的节点层数。

use crate::core::error::CompileResult;
use crate::core::expression::criteria::{combine_criteria, separate_criteria};
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::RelNode;

#[derive(Debug)]
pub struct MergeCriteriaRule;

impl OptimizerRule for MergeCriteriaRule {
    fn id(&self) -> RuleId {
        RuleId::MergeCriteria
    }

    fn execute(&self, root: RelNode, _ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        root.transform(&mut |node| {
            let mut select = match node {
                RelNode::Select(s) => s,
                other => return Ok(other),
            };

            while let Some(RelNode::Select(child)) = select.child.as_deref() {
                if child.is_having != select.is_having
                    || !child.subquery_correlations.is_empty()
                    || !select.subquery_correlations.is_empty()
                {
                    break;
                }
                let child = match *select.child.take().unwrap() {
                    RelNode::Select(c) => c,
                    _ => unreachable!(),
                };

                let mut conjuncts = separate_criteria(&select.criteria);
                for conjunct in separate_criteria(&child.criteria) {
                    if !conjuncts.contains(&conjunct) {
                        conjuncts.push(conjunct);
                    }
                }
                select.criteria = combine_criteria(conjuncts);
                for g in child.groups().to_vec() {
                    select.add_group(g);
                }
                select.child = child.child;
            }

            Ok(select.into_node())
        })
    }
}
