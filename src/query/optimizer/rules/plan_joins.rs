//! 连接规划规则
//!
//! 按基数估计调整可交换内连接的左右顺序：小侧放左边，
//! 供归并/依赖策略把小侧作为驱动侧。外连接不动。

use crate::core::error::CompileResult;
use crate::query::command::JoinType;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::RelNode;

#[derive(Debug)]
pub struct PlanJoinsRule;

impl OptimizerRule for PlanJoinsRule {
    fn id(&self) -> RuleId {
        RuleId::PlanJoins
    }

    fn execute(&self, mut root: RelNode, ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        // 成本计算阶段在本规则之后才弹出，先按需填充基数估计
        super::calculate_cost::estimate(&mut root, ctx.env.metadata.as_ref());

        root.transform(&mut |node| {
            let mut join = match node {
                RelNode::Join(j) => j,
                other => return Ok(other),
            };

            if !matches!(join.join_type, JoinType::Inner | JoinType::Cross)
                || join.dependent_side.is_some()
            {
                return Ok(RelNode::Join(join));
            }

            let left_card = join.left.estimates().cardinality;
            let right_card = join.right.estimates().cardinality;
            if let (Some(l), Some(r)) = (left_card, right_card) {
                if r < l {
                    log::debug!("交换连接两侧 (左 {} 行, 右 {} 行)", l, r);
                    std::mem::swap(&mut join.left, &mut join.right);
                    std::mem::swap(&mut join.left_sort, &mut join.right_sort);
                    std::mem::swap(&mut join.left_correlation, &mut join.right_correlation);
                }
            }
            Ok(RelNode::Join(join))
        })
    }
}
