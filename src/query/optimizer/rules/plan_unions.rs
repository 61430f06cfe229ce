//! 联合规划规则
//!
//! 集合运算的规范化与分区提示消费的起点：发现带分区信息的
//! UNION ALL 参与连接时，向工作列表追加联合/连接分解规则。
//! 规则自推是工作列表契约的一部分。

use crate::core::error::CompileResult;
use crate::query::command::SetOperation;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::RelNode;
use crate::query::planner::plan::NodeMask;

#[derive(Debug)]
pub struct PlanUnionsRule;

impl OptimizerRule for PlanUnionsRule {
    fn id(&self) -> RuleId {
        RuleId::PlanUnions
    }

    fn execute(&self, root: RelNode, ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        let mut partitioned_under_join = false;

        for join in root.find_nodes(NodeMask::JOIN) {
            for child in join.children() {
                if let RelNode::SetOp(set_op) = child {
                    if set_op.op == SetOperation::Union
                        && set_op.all
                        && set_op
                            .partition_info
                            .as_ref()
                            .map(|p| !p.is_empty())
                            .unwrap_or(false)
                    {
                        partitioned_under_join = true;
                    }
                }
            }
        }

        if partitioned_under_join && !ctx.stack.contains(RuleId::DecomposeJoin) {
            log::debug!("发现分区 UNION 参与连接，追加分解规则");
            ctx.stack.push(RuleId::DecomposeJoin);
        }

        Ok(root)
    }
}
