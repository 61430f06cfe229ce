//! 计划结构校验
//!
//! 优化结束后的结构检查：二元节点的孩子数由类型系统保证，
//! 这里校验剩余的结构不变量。违规是规划器结构错误，直接中止。

use crate::core::error::{CompileResult, PlannerError};
use crate::query::planner::plan::{NodeMask, RelNode};

/// 校验优化后的计划树
pub fn validate_plan(root: &RelNode) -> CompileResult<()> {
    // 节点 ID 不得重复
    let mut seen = std::collections::HashSet::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.id() >= 0 && !seen.insert(node.id()) {
            return Err(PlannerError::InvariantViolation(format!(
                "节点 ID {} 重复出现",
                node.id()
            ))
            .into());
        }
        stack.extend(node.children());
    }

    // 访问节点必须有模型、命令或子计划之一的来源信息
    for access in root.find_nodes(NodeMask::ACCESS) {
        if let RelNode::Access(a) = access {
            if a.command.is_none() && a.nested_plan.is_none() && a.child.is_none() {
                return Err(PlannerError::InvariantViolation(
                    "访问节点既无命令也无子计划".to_string(),
                )
                .into());
            }
        }
    }

    // 虚拟来源的符号映射键值数量一致由 SymbolMap 保证；
    // 这里检查映射键与输出列对齐
    for source in root.find_nodes(NodeMask::SOURCE) {
        if let RelNode::Source(s) = source {
            if let Some(map) = &s.symbol_map {
                if !s.output_cols().is_empty() && map.len() != s.output_cols().len() {
                    return Err(PlannerError::InvariantViolation(format!(
                        "虚拟来源 {} 的符号映射与输出列数不一致",
                        s.group
                            .as_ref()
                            .map(|g| g.name())
                            .unwrap_or("<anonymous>")
                    ))
                    .into());
                }
            }
        }
    }

    Ok(())
}
