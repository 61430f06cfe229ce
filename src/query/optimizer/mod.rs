//! 规则引擎
//!
//! 对计划树执行一条按提示条件排序的优化规则序列，直到工作列表
//! 为空。列出的顺序是压栈优先级：后压入的先执行，访问放置最先
//! 运行，来源收拢最后运行。规则在执行中可以向工作列表两端追加
//! 规则；防御性的执行次数上限兜底病态的自我追加循环。

pub mod rules;
pub mod validate;

use std::collections::VecDeque;

use crate::core::error::{CompileResult, PlannerError};
use crate::query::planner::hints::PlanHints;
use crate::query::planner::plan::RelNode;
use crate::query::PlanEnv;

/// 优化规则标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleId {
    CollapseSource,
    PlanSorts,
    MergeCriteria,
    ImplementJoinStrategy,
    CalculateCost,
    AssignOutputElements,
    PushLimit,
    PlanProcedures,
    PushAggregates,
    ChooseDependent,
    ChooseJoinStrategy,
    RaiseAccess,
    PushBackCriteria,
    PlanJoins,
    PlanUnions,
    CleanCriteria,
    CopyCriteria,
    MergeVirtual,
    PushSelectCriteria,
    DecomposeJoin,
    RemoveOptionalJoins,
    PlaceAccess,
}

/// 待执行规则的双端工作列表
#[derive(Debug, Default)]
pub struct RuleStack {
    rules: VecDeque<RuleId>,
}

impl RuleStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// 压入栈顶（下一个执行）
    pub fn push(&mut self, rule: RuleId) {
        self.rules.push_front(rule);
    }

    /// 压入栈底（最后执行）
    pub fn push_back(&mut self, rule: RuleId) {
        self.rules.push_back(rule);
    }

    pub fn pop(&mut self) -> Option<RuleId> {
        self.rules.pop_front()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn contains(&self, rule: RuleId) -> bool {
        self.rules.contains(&rule)
    }

    /// 当前序列快照（测试确定性用）
    pub fn snapshot(&self) -> Vec<RuleId> {
        self.rules.iter().copied().collect()
    }
}

/// 按固定优先级构造规则序列
///
/// 每个阶段只在守护提示为真时压入；同一提示集两次调用的结果
/// 逐字节一致。
pub fn rule_sequence(hints: &PlanHints) -> RuleStack {
    let mut stack = RuleStack::new();

    stack.push(RuleId::CollapseSource);
    stack.push(RuleId::PlanSorts);
    if hints.has_criteria || hints.has_join {
        stack.push(RuleId::MergeCriteria);
    }
    if hints.has_join {
        stack.push(RuleId::ImplementJoinStrategy);
    }
    stack.push(RuleId::CalculateCost);
    stack.push(RuleId::AssignOutputElements);
    if hints.has_limit {
        stack.push(RuleId::PushLimit);
    }
    if hints.has_relational_procedure {
        stack.push(RuleId::PlanProcedures);
    }
    if hints.has_aggregates {
        stack.push(RuleId::PushAggregates);
    }
    if hints.has_join {
        stack.push(RuleId::ChooseDependent);
        stack.push(RuleId::ChooseJoinStrategy);
        stack.push(RuleId::RaiseAccess);
    }
    if hints.has_criteria {
        stack.push(RuleId::PushBackCriteria);
    }
    if hints.has_join {
        stack.push(RuleId::PlanJoins);
    }
    stack.push(RuleId::RaiseAccess);
    if hints.has_set_query {
        stack.push(RuleId::PlanUnions);
    }
    if hints.has_criteria {
        stack.push(RuleId::CleanCriteria);
    }
    if hints.has_criteria && hints.has_join {
        stack.push(RuleId::CopyCriteria);
    }
    if hints.has_virtual_groups {
        stack.push(RuleId::MergeVirtual);
    }
    if hints.has_criteria || hints.has_virtual_groups {
        stack.push(RuleId::PushSelectCriteria);
    }
    if hints.has_set_query && hints.has_join {
        stack.push(RuleId::DecomposeJoin);
    }
    if hints.has_optional_join {
        stack.push(RuleId::RemoveOptionalJoins);
    }
    stack.push(RuleId::AssignOutputElements);
    // 访问放置永远最后压入，因此最先执行
    stack.push(RuleId::PlaceAccess);
    stack
}

/// 规则执行上下文
pub struct RuleContext<'e> {
    pub env: &'e mut PlanEnv,
    pub stack: &'e mut RuleStack,
    pub hints: &'e PlanHints,
}

/// 优化规则
///
/// 拿到当前树的所有权，返回改写后的树。同一棵树上不会有两条
/// 规则并发执行。
pub trait OptimizerRule: Sync {
    fn id(&self) -> RuleId;

    fn execute(&self, root: RelNode, ctx: &mut RuleContext<'_>) -> CompileResult<RelNode>;
}

/// 弹出-执行-替换，直到工作列表为空
pub fn execute_rules(
    mut root: RelNode,
    hints: &PlanHints,
    env: &mut PlanEnv,
) -> CompileResult<RelNode> {
    let mut stack = rule_sequence(hints);
    execute_stack(&mut root, &mut stack, hints, env)?;
    Ok(root)
}

fn execute_stack(
    root: &mut RelNode,
    stack: &mut RuleStack,
    hints: &PlanHints,
    env: &mut PlanEnv,
) -> CompileResult<()> {
    let ceiling = env.config.max_rule_executions;
    let mut executed = 0usize;

    while let Some(rule_id) = stack.pop() {
        executed += 1;
        if executed > ceiling {
            return Err(PlannerError::RuleCeiling(ceiling).into());
        }

        log::debug!("执行优化规则 {:?} (第 {} 次)", rule_id, executed);
        let rule = rules::rule_for(rule_id);
        let current = std::mem::replace(root, crate::query::planner::plan::nodes::NullNode::new().into_node());
        let mut ctx = RuleContext { env, stack, hints };
        *root = rule.execute(current, &mut ctx)?;
    }

    env.sink.record_line(format!("规则管线结束，共执行 {} 条规则", executed));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_deterministic() {
        let mut hints = PlanHints::new();
        hints.has_join = true;
        hints.has_criteria = true;
        hints.has_set_query = true;

        let a = rule_sequence(&hints).snapshot();
        let b = rule_sequence(&hints).snapshot();
        assert_eq!(a, b);
    }

    #[test]
    fn test_place_access_pops_first_collapse_last() {
        let hints = PlanHints::new();
        let mut stack = rule_sequence(&hints);
        assert_eq!(stack.pop(), Some(RuleId::PlaceAccess));
        let mut last = None;
        while let Some(r) = stack.pop() {
            last = Some(r);
        }
        assert_eq!(last, Some(RuleId::CollapseSource));
    }

    #[test]
    fn test_hint_gates() {
        let hints = PlanHints::new();
        let plain = rule_sequence(&hints).snapshot();
        assert!(!plain.contains(&RuleId::PlanUnions));
        assert!(!plain.contains(&RuleId::PushLimit));
        assert!(!plain.contains(&RuleId::MergeVirtual));

        let mut hints = PlanHints::new();
        hints.has_set_query = true;
        hints.has_limit = true;
        let gated = rule_sequence(&hints).snapshot();
        assert!(gated.contains(&RuleId::PlanUnions));
        assert!(gated.contains(&RuleId::PushLimit));
    }

    #[test]
    fn test_double_ended_pushes() {
        let mut stack = RuleStack::new();
        stack.push(RuleId::RaiseAccess);
        stack.push_back(RuleId::CollapseSource);
        stack.push(RuleId::PlaceAccess);
        assert_eq!(
            stack.snapshot(),
            vec![RuleId::PlaceAccess, RuleId::RaiseAccess, RuleId::CollapseSource]
        );
    }
}
