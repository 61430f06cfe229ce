//! 访问上提规则
//!
//! 能力允许时把访问节点沿父链上提，吞并可以在源内执行的算子。
//! 上提到不能再动为止；同模型的两个访问在连接/集合运算处合流。

use std::sync::Arc;

use crate::core::error::CompileResult;
use crate::query::command::{JoinType, SetOperation};
use crate::query::metadata::{Capability, CapabilityFinder};
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::{AccessNode, RelNode};

#[derive(Debug)]
pub struct RaiseAccessRule;

impl OptimizerRule for RaiseAccessRule {
    fn id(&self) -> RuleId {
        RuleId::RaiseAccess
    }

    fn execute(&self, mut root: RelNode, ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        let caps = ctx.env.capabilities.clone();
        let max_rounds = root.count_nodes() + 1;
        for _ in 0..max_rounds {
            let mut changed = false;
            root = root.transform(&mut |node| Ok(raise_one(node, &caps, &mut changed)))?;
            if !changed {
                break;
            }
        }
        Ok(root)
    }
}

fn raise_one(
    node: RelNode,
    caps: &Arc<dyn CapabilityFinder>,
    changed: &mut bool,
) -> RelNode {
    match node {
        // Select(Access(x)) -> Access(Select(x))
        RelNode::Select(mut select) => {
            if select.is_having || select.criteria.has_subquery() {
                return RelNode::Select(select);
            }
            match raisable_access(select.child.take()) {
                Ok(mut access) => {
                    let model = access.model.clone().unwrap_or_default();
                    if caps.supports(&model, Capability::Criteria) {
                        *changed = true;
                        let inner = access.child.take().map(|b| *b);
                        select.child = inner.map(Box::new);
                        let select_groups = select.groups().to_vec();
                        access.child = Some(Box::new(select.into_node()));
                        for g in select_groups {
                            access.add_group(g);
                        }
                        RelNode::Access(access)
                    } else {
                        select.child = Some(Box::new(access.into_node()));
                        RelNode::Select(select)
                    }
                }
                Err(child) => {
                    select.child = child;
                    RelNode::Select(select)
                }
            }
        }
        // Project(Access(x)) -> Access(Project(x))：纯列投影总是可下推
        RelNode::Project(mut project) => {
            if project.into_target.is_some()
                || project.cols.iter().any(|c| c.expr.has_subquery())
            {
                return RelNode::Project(project);
            }
            match raisable_access(project.child.take()) {
                Ok(mut access) => {
                    *changed = true;
                    let inner = access.child.take().map(|b| *b);
                    project.child = inner.map(Box::new);
                    let output = project.output_cols().to_vec();
                    access.child = Some(Box::new(project.into_node()));
                    access.set_output_cols(output);
                    RelNode::Access(access)
                }
                Err(child) => {
                    project.child = child;
                    RelNode::Project(project)
                }
            }
        }
        // Sort(Access(x)) -> Access(Sort(x))
        RelNode::Sort(mut sort) => {
            match raisable_access(sort.child.take()) {
                Ok(mut access) => {
                    let model = access.model.clone().unwrap_or_default();
                    if caps.supports(&model, Capability::OrderBy) {
                        *changed = true;
                        let inner = access.child.take().map(|b| *b);
                        sort.child = inner.map(Box::new);
                        access.child = Some(Box::new(sort.into_node()));
                        RelNode::Access(access)
                    } else {
                        sort.child = Some(Box::new(access.into_node()));
                        RelNode::Sort(sort)
                    }
                }
                Err(child) => {
                    sort.child = child;
                    RelNode::Sort(sort)
                }
            }
        }
        // DupRemove(Access(x)) -> Access(DupRemove(x))
        RelNode::DupRemove(mut dup) => {
            match raisable_access(dup.child.take()) {
                Ok(mut access) => {
                    let model = access.model.clone().unwrap_or_default();
                    if caps.supports(&model, Capability::Distinct) {
                        *changed = true;
                        let inner = access.child.take().map(|b| *b);
                        dup.child = inner.map(Box::new);
                        access.child = Some(Box::new(dup.into_node()));
                        RelNode::Access(access)
                    } else {
                        dup.child = Some(Box::new(access.into_node()));
                        RelNode::DupRemove(dup)
                    }
                }
                Err(child) => {
                    dup.child = child;
                    RelNode::DupRemove(dup)
                }
            }
        }
        // TupleLimit(Access(x)) -> Access(TupleLimit(x))
        RelNode::TupleLimit(mut limit) => {
            match raisable_access(limit.child.take()) {
                Ok(mut access) => {
                    let model = access.model.clone().unwrap_or_default();
                    let ok = caps.supports(&model, Capability::RowLimit)
                        && (limit.offset.is_none()
                            || caps.supports(&model, Capability::RowOffset));
                    if ok {
                        *changed = true;
                        let inner = access.child.take().map(|b| *b);
                        limit.child = inner.map(Box::new);
                        access.child = Some(Box::new(limit.into_node()));
                        RelNode::Access(access)
                    } else {
                        limit.child = Some(Box::new(access.into_node()));
                        RelNode::TupleLimit(limit)
                    }
                }
                Err(child) => {
                    limit.child = child;
                    RelNode::TupleLimit(limit)
                }
            }
        }
        // Group(Access(x)) -> Access(Group(x))
        RelNode::Group(mut group) => {
            match raisable_access(group.child.take()) {
                Ok(mut access) => {
                    let model = access.model.clone().unwrap_or_default();
                    if caps.supports(&model, Capability::Aggregates) {
                        *changed = true;
                        let inner = access.child.take().map(|b| *b);
                        group.child = inner.map(Box::new);
                        access.child = Some(Box::new(group.into_node()));
                        RelNode::Access(access)
                    } else {
                        group.child = Some(Box::new(access.into_node()));
                        RelNode::Group(group)
                    }
                }
                Err(child) => {
                    group.child = child;
                    RelNode::Group(group)
                }
            }
        }
        // Join(Access(a), Access(b)) 同模型 -> Access(Join(a, b))
        RelNode::Join(mut join) => {
            let same_model = match (join.left.as_ref(), join.right.as_ref()) {
                (RelNode::Access(l), RelNode::Access(r))
                    if !l.is_subplan()
                        && !r.is_subplan()
                        && !wraps_raw_command(l)
                        && !wraps_raw_command(r) =>
                {
                    match (&l.model, &r.model) {
                        (Some(lm), Some(rm)) if lm == rm => Some(lm.clone()),
                        _ => None,
                    }
                }
                _ => None,
            };
            let model = match same_model {
                Some(m) => m,
                None => return RelNode::Join(join),
            };

            let join_cap = match join.join_type {
                JoinType::Inner | JoinType::Cross => caps.supports(&model, Capability::Join),
                _ => {
                    caps.supports(&model, Capability::Join)
                        && caps.supports(&model, Capability::OuterJoin)
                }
            };
            let criteria_ok = !join.criteria.iter().any(|c| c.has_subquery());
            if !join_cap || !criteria_ok || join.dependent_side.is_some() {
                return RelNode::Join(join);
            }

            *changed = true;
            let mut left_access = match *std::mem::replace(
                &mut join.left,
                Box::new(crate::query::planner::plan::nodes::NullNode::new().into_node()),
            ) {
                RelNode::Access(a) => a,
                _ => unreachable!(),
            };
            let right_access = match *std::mem::replace(
                &mut join.right,
                Box::new(crate::query::planner::plan::nodes::NullNode::new().into_node()),
            ) {
                RelNode::Access(a) => a,
                _ => unreachable!(),
            };

            let mut merged = AccessNode::new(Some(model), None);
            merged.set_id(left_access.id());
            merged.dependent_hint = left_access.dependent_hint.or(right_access.dependent_hint);
            for g in left_access
                .groups()
                .iter()
                .chain(right_access.groups().iter())
            {
                merged.add_group(g.clone());
            }
            let output = join.output_cols().to_vec();

            let mut right_access = right_access;
            join.left = Box::new(
                left_access
                    .child
                    .take()
                    .map(|b| *b)
                    .unwrap_or_else(|| {
                        crate::query::planner::plan::nodes::NullNode::new().into_node()
                    }),
            );
            join.right = Box::new(
                right_access
                    .child
                    .take()
                    .map(|b| *b)
                    .unwrap_or_else(|| {
                        crate::query::planner::plan::nodes::NullNode::new().into_node()
                    }),
            );
            merged.child = Some(Box::new(RelNode::Join(join)));
            merged.set_output_cols(output);
            RelNode::Access(merged)
        }
        // SetOp(Access(a), Access(b)) 同模型 -> Access(SetOp(a, b))
        RelNode::SetOp(mut set_op) => {
            let same_model = match (set_op.left.as_ref(), set_op.right.as_ref()) {
                (RelNode::Access(l), RelNode::Access(r))
                    if !l.is_subplan()
                        && !r.is_subplan()
                        && !wraps_raw_command(l)
                        && !wraps_raw_command(r) =>
                {
                    match (&l.model, &r.model) {
                        (Some(lm), Some(rm)) if lm == rm => Some(lm.clone()),
                        _ => None,
                    }
                }
                _ => None,
            };
            let model = match same_model {
                Some(m) => m,
                None => return RelNode::SetOp(set_op),
            };

            let cap = match set_op.op {
                SetOperation::Union => Capability::Union,
                SetOperation::Intersect => Capability::Intersect,
                SetOperation::Except => Capability::Except,
            };
            if !caps.supports(&model, cap) {
                return RelNode::SetOp(set_op);
            }

            *changed = true;
            let mut left_access = match *std::mem::replace(
                &mut set_op.left,
                Box::new(crate::query::planner::plan::nodes::NullNode::new().into_node()),
            ) {
                RelNode::Access(a) => a,
                _ => unreachable!(),
            };
            let mut right_access = match *std::mem::replace(
                &mut set_op.right,
                Box::new(crate::query::planner::plan::nodes::NullNode::new().into_node()),
            ) {
                RelNode::Access(a) => a,
                _ => unreachable!(),
            };

            let mut merged = AccessNode::new(Some(model), None);
            merged.set_id(left_access.id());
            for g in left_access
                .groups()
                .iter()
                .chain(right_access.groups().iter())
            {
                merged.add_group(g.clone());
            }
            let output = set_op.output_cols().to_vec();
            set_op.left = Box::new(left_access.child.take().map(|b| *b).unwrap_or_else(|| {
                crate::query::planner::plan::nodes::NullNode::new().into_node()
            }));
            set_op.right = Box::new(right_access.child.take().map(|b| *b).unwrap_or_else(
                || crate::query::planner::plan::nodes::NullNode::new().into_node(),
            ));
            merged.child = Some(Box::new(RelNode::SetOp(set_op)));
            merged.set_output_cols(output);
            RelNode::Access(merged)
        }
        other => other,
    }
}

/// 子节点恰为可上提的访问节点时取出，否则原样归还
///
/// 包着原始变更/过程命令来源的访问形态固定，不参与上提。
fn raisable_access(
    child: Option<Box<RelNode>>,
) -> Result<AccessNode, Option<Box<RelNode>>> {
    match child {
        Some(boxed) => match *boxed {
            RelNode::Access(a)
                if !a.is_subplan() && a.command.is_none() && !wraps_raw_command(&a) =>
            {
                Ok(a)
            }
            other => Err(Some(Box::new(other))),
        },
        None => Err(None),
    }
}

/// 访问子树里是否存在持有原始命令的来源节点
fn wraps_raw_command(access: &AccessNode) -> bool {
    let mut stack: Vec<&RelNode> = access.child.iter().map(|b| b.as_ref()).collect();
    while let Some(node) = stack.pop() {
        if let RelNode::Source(s) = node {
            if s.command.is_some() {
                return true;
            }
        }
        stack.extend(node.children());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::Expression;
    use crate::core::symbol::{ElementSymbol, GroupSymbol};
    use crate::core::value::{DataType, Value};
    use crate::query::planner::plan::nodes::{SelectNode, SourceNode};
    use crate::query::planner::plan::NodeMask;

    fn access_over(group: &str, model: &str) -> RelNode {
        AccessNode::new(
            Some(model.to_string()),
            Some(SourceNode::for_group(GroupSymbol::new(group)).into_node()),
        )
        .into_node()
    }

    #[test]
    fn test_select_raised_into_access() {
        let criteria = Expression::eq(
            Expression::Element(ElementSymbol::new("g1.a", DataType::Integer)),
            Expression::Constant(Value::Integer(1)),
        );
        let tree = SelectNode::new(criteria, Some(access_over("g1", "source1"))).into_node();

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

        let out = RaiseAccessRule.execute(tree, &mut ctx).unwrap();
        assert!(matches!(out, RelNode::Access(_)));
        // 选择现在位于访问之内
        if let RelNode::Access(a) = &out {
            assert!(matches!(a.child.as_deref(), Some(RelNode::Select(_))));
        }
    }

    #[test]
    fn test_same_model_join_merged() {
        let join = crate::query::planner::plan::nodes::JoinNode::new(
            crate::query::command::JoinType::Inner,
            access_over("g1", "source1"),
            access_over("g2", "source1"),
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

        let out = RaiseAccessRule.execute(join.into_node(), &mut ctx).unwrap();
        assert_eq!(out.find_nodes(NodeMask::ACCESS).len(), 1);
        assert!(matches!(out, RelNode::Access(_)));
    }
}
