//! 排序规划规则
//!
//! 去掉冗余排序：空排序直接消去，排序之上的排序以外层为准，
//! 去重紧贴排序时合成一次排序去重。

use crate::core::error::CompileResult;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::RelNode;

#[derive(Debug)]
pub struct PlanSortsRule;

impl OptimizerRule for PlanSortsRule {
    fn id(&self) -> RuleId {
        RuleId::PlanSorts
    }

    fn execute(&self, root: RelNode, _ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        root.transform(&mut |node| {
            match node {
                RelNode::Sort(mut sort) => {
                    if sort.items.is_empty() && !sort.distinct {
                        return Ok(match sort.child.take() {
                            Some(child) => *child,
                            None => RelNode::Sort(sort),
                        });
                    }
                    // 内层排序被外层覆盖
                    if let Some(RelNode::Sort(inner)) = sort.child.as_deref() {
                        if !inner.distinct {
                            let inner = match *sort.child.take().unwrap() {
                                RelNode::Sort(s) => s,
                                _ => unreachable!(),
                            };
                            sort.child = inner.child;
                        }
                    }
                    Ok(RelNode::Sort(sort))
                }
                // DupRemove(Sort(x)) -> 排序去重一趟完成
                RelNode::DupRemove(mut dup) => {
                    if let Some(RelNode::Sort(_)) = dup.child.as_deref() {
                        let mut sort = match *dup.child.take().unwrap() {
                            RelNode::Sort(s) => s,
                            _ => unreachable!(),
                        };
                        sort.distinct = true;
                        sort.set_output_cols(dup.output_cols().to_vec());
                        log::debug!("去重合入排序节点");
                        return Ok(sort.into_node());
                    }
                    Ok(RelNode::DupRemove(dup))
                }
                other => Ok(other),
            }
        })
    }
}
