//! 成本计算规则
//!
//! 自底向上填充基数估计：来源取目录统计，选择按固定选择率
//! 衰减，连接区分等值与笛卡尔。估计值随节点进入执行算子，
//! 供运行时的依赖连接与缓冲决策参考。

use crate::core::error::CompileResult;
use crate::core::expression::Expression;
use crate::core::value::Value;
use crate::query::command::SetOperation;
use crate::query::metadata::CatalogMetadata;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::RelNode;

const SELECT_SELECTIVITY: f64 = 0.33;
const GROUP_REDUCTION: f64 = 0.25;
const DISTINCT_REDUCTION: f64 = 0.5;
const EQUALITY_JOIN_FACTOR: f64 = 0.1;

#[derive(Debug)]
pub struct CalculateCostRule;

impl OptimizerRule for CalculateCostRule {
    fn id(&self) -> RuleId {
        RuleId::CalculateCost
    }

    fn execute(&self, mut root: RelNode, ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        estimate(&mut root, ctx.env.metadata.as_ref());
        Ok(root)
    }
}

/// 自底向上填充基数估计；需要成本的规则在成本计算阶段之前
/// 弹出时按需调用同一段逻辑
pub(crate) fn estimate(node: &mut RelNode, metadata: &dyn CatalogMetadata) {
    for child in node.children_mut() {
        estimate(child, metadata);
    }

    let child_card = node
        .children()
        .first()
        .and_then(|c| c.estimates().cardinality);

    let cardinality = match node {
        RelNode::Source(s) => match (&s.group, &s.child) {
            (_, Some(child)) => child.estimates().cardinality,
            (Some(g), None) => metadata.cardinality(g),
            _ => None,
        },
        RelNode::Select(_) => child_card.map(|c| (c * SELECT_SELECTIVITY).max(1.0)),
        RelNode::Join(j) => {
            let l = j.left.estimates().cardinality;
            let r = j.right.estimates().cardinality;
            match (l, r) {
                (Some(l), Some(r)) => {
                    let product = l * r;
                    let card = if j.equality_criteria().is_empty() {
                        product
                    } else {
                        (product * EQUALITY_JOIN_FACTOR).max(1.0)
                    };
                    // 连接成本估计一并填充
                    let estimates = j.estimates_mut();
                    estimates.join_cost = Some(l + r + product / 1000.0);
                    Some(card)
                }
                _ => None,
            }
        }
        RelNode::Group(_) => child_card.map(|c| (c * GROUP_REDUCTION).max(1.0)),
        RelNode::DupRemove(_) => child_card.map(|c| (c * DISTINCT_REDUCTION).max(1.0)),
        RelNode::TupleLimit(l) => {
            let limit = match &l.limit {
                Some(Expression::Constant(Value::Integer(n))) => Some(*n as f64),
                _ => None,
            };
            match (limit, child_card) {
                (Some(n), Some(c)) => Some(n.min(c)),
                (Some(n), None) => Some(n),
                (None, c) => c,
            }
        }
        RelNode::SetOp(s) => {
            let l = s.left.estimates().cardinality;
            let r = s.right.estimates().cardinality;
            match (l, r, s.op) {
                (Some(l), Some(r), SetOperation::Union) => Some(l + r),
                (Some(l), Some(r), SetOperation::Intersect) => Some(l.min(r)),
                (Some(l), _, SetOperation::Except) => Some(l),
                _ => None,
            }
        }
        RelNode::Null(_) => Some(0.0),
        // 投影/排序/访问不改变行数
        _ => child_card,
    };

    if let Some(card) = cardinality {
        node.estimates_mut().cardinality = Some(card);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol::{ElementSymbol, GroupSymbol};
    use crate::core::value::DataType;
    use crate::query::planner::plan::nodes::{SelectNode, SourceNode};

    #[test]
    fn test_source_and_select_estimates() {
        let env = crate::query::test_support::env_with_table(
            "pm1.g1",
            "source1",
            vec![("e1", DataType::Integer)],
        );

        let source = SourceNode::for_group(GroupSymbol::new("pm1.g1"));
        let criteria = Expression::eq(
            Expression::Element(ElementSymbol::new("pm1.g1.e1", DataType::Integer)),
            Expression::Constant(Value::Integer(1)),
        );
        let mut tree = SelectNode::new(criteria, Some(source.into_node())).into_node();

        estimate(&mut tree, env.metadata.as_ref());
        // 目录基数 1000，选择率 0.33
        let card = tree.estimates().cardinality.unwrap();
        assert!(card > 300.0 && card < 400.0);
    }
}
