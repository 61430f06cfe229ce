//! 可选连接裁剪规则
//!
//! 带 optional 提示的连接，若其右侧组在子树之外没有任何引用，
//! 整个右侧连同连接一起裁掉，只留左侧。

use std::collections::HashSet;

use crate::core::error::CompileResult;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::RelNode;

#[derive(Debug)]
pub struct RemoveOptionalJoinsRule;

impl OptimizerRule for RemoveOptionalJoinsRule {
    fn id(&self) -> RuleId {
        RuleId::RemoveOptionalJoins
    }

    fn execute(&self, root: RelNode, ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        // 全树的表达式组引用（按节点 ID 记账，便于排除子树自身）
        let all_refs = collect_refs(&root);

        root.transform(&mut |node| {
            let join = match &node {
                RelNode::Join(j) if j.optional => j,
                _ => return Ok(node),
            };

            let right_groups: HashSet<String> =
                join.right.group_names().into_iter().collect();
            let subtree_ids = node_ids(join.right.as_ref());

            // 连接自身的条件也算子树内部引用
            let mut inside_ids = subtree_ids;
            inside_ids.insert(join.id());

            let referenced_outside = all_refs.iter().any(|(node_id, group)| {
                right_groups.contains(group) && !inside_ids.contains(node_id)
            });

            if referenced_outside {
                return Ok(node);
            }

            ctx.env.sink.record_line("可选连接右侧无引用，整体裁剪".to_string());
            log::debug!("裁剪可选连接 (id={})", node.id());
            let mut join = match node {
                RelNode::Join(j) => j,
                _ => unreachable!(),
            };
            Ok(*std::mem::replace(
                &mut join.left,
                Box::new(crate::query::planner::plan::nodes::NullNode::new().into_node()),
            ))
        })
    }
}

/// (节点 ID, 引用的组名) 对
fn collect_refs(root: &RelNode) -> Vec<(i64, String)> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        for expr in node.expressions() {
            for name in expr.group_names() {
                out.push((node.id(), name));
            }
        }
        stack.extend(node.children());
    }
    out
}

fn node_ids(root: &RelNode) -> HashSet<i64> {
    let mut out = HashSet::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        out.insert(node.id());
        stack.extend(node.children());
    }
    out
}
