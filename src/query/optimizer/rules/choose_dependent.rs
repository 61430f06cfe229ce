//! 依赖连接选择规则
//!
//! 决定连接是否按依赖方式执行：先求值小侧，用其值参数化另一侧
//! 的访问。显式 MAKE DEP / MAKE NOT DEP 提示优先于成本判断；
//! 成本路径要求有等值条件、被驱动侧支持依赖下推，且两侧基数差
//! 足够大。被驱动侧的谓词数受能力上限约束。

use crate::core::error::CompileResult;
use crate::query::command::JoinType;
use crate::query::metadata::Capability;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::{JoinSide, RelNode};

/// 成本模型生效时要求的大小侧倍数差
const DEPENDENT_RATIO: f64 = 100.0;

#[derive(Debug)]
pub struct ChooseDependentRule;

impl OptimizerRule for ChooseDependentRule {
    fn id(&self) -> RuleId {
        RuleId::ChooseDependent
    }

    fn execute(&self, mut root: RelNode, ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        let caps = ctx.env.capabilities.clone();
        let cost_model = ctx.env.config.enable_cost_model;
        let fallback_limit = ctx.env.config.default_dependent_in_limit;

        // 成本计算阶段此时尚未弹出，按需先填充基数估计
        if cost_model {
            super::calculate_cost::estimate(&mut root, ctx.env.metadata.as_ref());
        }

        root.transform(&mut |node| {
            let mut join = match node {
                RelNode::Join(j) => j,
                other => return Ok(other),
            };

            if !matches!(join.join_type, JoinType::Inner)
                || join.equality_criteria().is_empty()
                || join.dependent_side.is_some()
            {
                return Ok(RelNode::Join(join));
            }

            let hint_of = |side: &RelNode| match side {
                RelNode::Access(a) => a.dependent_hint,
                _ => None,
            };
            let model_of = |side: &RelNode| match side {
                RelNode::Access(a) => a.model.clone(),
                _ => None,
            };

            // 显式提示优先
            if hint_of(join.left.as_ref()) == Some(true) {
                join.dependent_side = Some(JoinSide::Left);
                return Ok(RelNode::Join(join));
            }
            if hint_of(join.right.as_ref()) == Some(true) {
                join.dependent_side = Some(JoinSide::Right);
                return Ok(RelNode::Join(join));
            }
            let forbidden_left = hint_of(join.left.as_ref()) == Some(false);
            let forbidden_right = hint_of(join.right.as_ref()) == Some(false);

            if !cost_model {
                return Ok(RelNode::Join(join));
            }

            let left_card = join.left.estimates().cardinality;
            let right_card = join.right.estimates().cardinality;
            let (small, large, dependent) = match (left_card, right_card) {
                (Some(l), Some(r)) if l * DEPENDENT_RATIO <= r => (l, r, JoinSide::Right),
                (Some(l), Some(r)) if r * DEPENDENT_RATIO <= l => (r, l, JoinSide::Left),
                _ => return Ok(RelNode::Join(join)),
            };
            if (dependent == JoinSide::Left && forbidden_left)
                || (dependent == JoinSide::Right && forbidden_right)
            {
                return Ok(RelNode::Join(join));
            }

            // 被驱动侧必须支持依赖下推，谓词数不超过能力上限
            let dependent_node = match dependent {
                JoinSide::Left => join.left.as_ref(),
                JoinSide::Right => join.right.as_ref(),
            };
            let model = match model_of(dependent_node) {
                Some(m) => m,
                None => return Ok(RelNode::Join(join)),
            };
            if !caps.supports(&model, Capability::DependentJoin) {
                return Ok(RelNode::Join(join));
            }
            let predicate_limit = caps
                .max_dependent_predicates(&model)
                .unwrap_or(fallback_limit);
            if small as usize > predicate_limit {
                return Ok(RelNode::Join(join));
            }

            log::debug!(
                "选择依赖连接: 驱动 {} 行, 被驱动 {} 行, 侧={:?}",
                small,
                large,
                dependent
            );
            join.dependent_side = Some(dependent);
            join.estimates_mut().dependent_cardinality = Some(small);
            join.estimates_mut().dependent_access_cardinality =
                Some(large / DEPENDENT_RATIO);
            join.estimates_mut().dependent_join_cost = Some(small + large / DEPENDENT_RATIO);
            Ok(RelNode::Join(join))
        })
    }
}
