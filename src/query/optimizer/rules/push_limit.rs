//! 行数限制下推规则
//!
//! 源支持时把行数限制沉入访问节点；UNION ALL 的限制复制进
//! 每个分支（分支上限 = offset + limit，offset 仍留在顶端）。

use crate::core::error::CompileResult;
use crate::core::expression::Expression;
use crate::core::value::Value;
use crate::query::command::SetOperation;
use crate::query::metadata::Capability;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::{RelNode, TupleLimitNode};

#[derive(Debug)]
pub struct PushLimitRule;

impl OptimizerRule for PushLimitRule {
    fn id(&self) -> RuleId {
        RuleId::PushLimit
    }

    fn execute(&self, root: RelNode, ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        let caps = ctx.env.capabilities.clone();
        root.transform(&mut |node| {
            let mut limit = match node {
                RelNode::TupleLimit(l) => l,
                other => return Ok(other),
            };

            match limit.child.as_deref() {
                // TupleLimit(Access(x)) -> Access(TupleLimit(x))
                Some(RelNode::Access(access))
                    if !access.is_subplan() && access.command.is_none() =>
                {
                    let supported = access
                        .model
                        .as_deref()
                        .map(|m| {
                            caps.supports(m, Capability::RowLimit)
                                && (limit.offset.is_none()
                                    || caps.supports(m, Capability::RowOffset))
                        })
                        .unwrap_or(false);
                    if !supported {
                        return Ok(RelNode::TupleLimit(limit));
                    }

                    let mut access = match *limit.child.take().unwrap() {
                        RelNode::Access(a) => a,
                        _ => unreachable!(),
                    };
                    let inner = access.child.take().map(|b| *b);
                    limit.child = inner.map(Box::new);
                    access.child = Some(Box::new(limit.into_node()));
                    log::debug!("行数限制沉入访问节点");
                    Ok(RelNode::Access(access))
                }
                // TupleLimit(UnionAll) -> 分支各自加上限，顶端保留原样
                Some(RelNode::SetOp(set_op))
                    if set_op.op == SetOperation::Union && set_op.all =>
                {
                    let branch_limit = match branch_limit(&limit) {
                        Some(l) => l,
                        None => return Ok(RelNode::TupleLimit(limit)),
                    };

                    let mut set_op = match *limit.child.take().unwrap() {
                        RelNode::SetOp(s) => s,
                        _ => unreachable!(),
                    };

                    let already_limited = |n: &RelNode| matches!(n, RelNode::TupleLimit(_));
                    if !already_limited(set_op.left.as_ref()) {
                        let left = std::mem::replace(
                            &mut set_op.left,
                            Box::new(
                                crate::query::planner::plan::nodes::NullNode::new()
                                    .into_node(),
                            ),
                        );
                        set_op.left = Box::new(
                            TupleLimitNode::new(None, Some(branch_limit.clone()), Some(*left))
                                .into_node(),
                        );
                    }
                    if !already_limited(set_op.right.as_ref()) {
                        let right = std::mem::replace(
                            &mut set_op.right,
                            Box::new(
                                crate::query::planner::plan::nodes::NullNode::new()
                                    .into_node(),
                            ),
                        );
                        set_op.right = Box::new(
                            TupleLimitNode::new(None, Some(branch_limit), Some(*right))
                                .into_node(),
                        );
                    }

                    limit.child = Some(Box::new(RelNode::SetOp(set_op)));
                    Ok(RelNode::TupleLimit(limit))
                }
                _ => Ok(RelNode::TupleLimit(limit)),
            }
        })
    }
}

/// 分支上限 = offset + limit，两者都必须是整数常量
fn branch_limit(limit: &TupleLimitNode) -> Option<Expression> {
    let count = match &limit.limit {
        Some(Expression::Constant(Value::Integer(n))) => *n,
        _ => return None,
    };
    let offset = match &limit.offset {
        Some(Expression::Constant(Value::Integer(n))) => *n,
        None => 0,
        _ => return None,
    };
    Some(Expression::Constant(Value::Integer(count + offset)))
}
