//! 过程规划规则
//!
//! 把嵌套表连接两侧的相关引用映射移交给过程访问节点：
//! 依赖连接驱动的过程调用在转换时需要这张映射来构造
//! 依赖过程执行算子。

use crate::core::error::CompileResult;
use crate::query::command::Command;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::{JoinStrategy, RelNode};

#[derive(Debug)]
pub struct PlanProceduresRule;

impl OptimizerRule for PlanProceduresRule {
    fn id(&self) -> RuleId {
        RuleId::PlanProcedures
    }

    fn execute(&self, root: RelNode, _ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        root.transform(&mut |node| {
            let mut join = match node {
                RelNode::Join(j) if j.strategy == JoinStrategy::NestedTable => j,
                other => return Ok(other),
            };

            let left_corr = join.left_correlation.clone();
            let right_corr = join.right_correlation.clone();
            if let Some(map) = left_corr {
                attach_correlation(join.left.as_mut(), map);
            }
            if let Some(map) = right_corr {
                attach_correlation(join.right.as_mut(), map);
            }
            Ok(RelNode::Join(join))
        })
    }
}

/// 沿一元链下行，把映射挂到第一个过程访问/来源节点上
fn attach_correlation(node: &mut RelNode, map: crate::core::symbol::SymbolMap) {
    match node {
        RelNode::Access(access) => {
            let is_procedure = access
                .command
                .as_ref()
                .map(|c| matches!(c, Command::StoredProcedure(_)))
                .unwrap_or(false)
                || access.is_subplan();
            if is_procedure {
                access.correlated_refs = Some(map);
                return;
            }
            if let Some(child) = access.child.as_mut() {
                attach_correlation(child, map);
            }
        }
        RelNode::Source(source) => {
            let is_procedure = source
                .command
                .as_ref()
                .map(|c| matches!(c, Command::StoredProcedure(_)))
                .unwrap_or(false);
            if is_procedure {
                // 来源尚未被访问包裹时先记在子计划访问上无从谈起，
                // 留给访问放置后的第二趟
                return;
            }
            if let Some(child) = source.child.as_mut() {
                attach_correlation(child, map);
            }
        }
        other => {
            for child in other.children_mut() {
                attach_correlation(child, map.clone());
            }
        }
    }
}
