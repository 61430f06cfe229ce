//! 连接策略落地规则
//!
//! 归并类策略在两侧插入排序节点（排序已沉入源的一侧跳过）；
//! 增强归并把排序塞进访问节点内部，运行时按已排序输入归并。

use crate::core::error::CompileResult;
use crate::query::command::OrderByItem;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::{JoinStrategy, RelNode, SortNode};

#[derive(Debug)]
pub struct ImplementJoinStrategyRule;

impl OptimizerRule for ImplementJoinStrategyRule {
    fn id(&self) -> RuleId {
        RuleId::ImplementJoinStrategy
    }

    fn execute(&self, root: RelNode, _ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        root.transform(&mut |node| {
            let mut join = match node {
                RelNode::Join(j)
                    if matches!(
                        j.strategy,
                        JoinStrategy::Merge | JoinStrategy::EnhancedMerge
                    ) =>
                {
                    j
                }
                other => return Ok(other),
            };

            let left_items = join.left_sort.clone().unwrap_or_default();
            let right_items = join.right_sort.clone().unwrap_or_default();
            if left_items.is_empty() || right_items.is_empty() {
                return Ok(RelNode::Join(join));
            }

            let enhanced = join.strategy == JoinStrategy::EnhancedMerge;

            let left = std::mem::replace(
                &mut join.left,
                Box::new(crate::query::planner::plan::nodes::NullNode::new().into_node()),
            );
            join.left = Box::new(ensure_sorted(*left, &left_items, enhanced));
            let right = std::mem::replace(
                &mut join.right,
                Box::new(crate::query::planner::plan::nodes::NullNode::new().into_node()),
            );
            join.right = Box::new(ensure_sorted(*right, &right_items, enhanced));

            Ok(RelNode::Join(join))
        })
    }
}

/// 给一侧补排序；增强归并时排序进到访问节点里面
fn ensure_sorted(side: RelNode, items: &[OrderByItem], into_access: bool) -> RelNode {
    // 已经按同一键排序则不动
    if let RelNode::Sort(existing) = &side {
        if existing.items == items {
            return side;
        }
    }
    if let RelNode::Access(access) = &side {
        if let Some(RelNode::Sort(existing)) = access.child.as_deref() {
            if existing.items == items {
                return side;
            }
        }
    }

    match side {
        RelNode::Access(mut access) if into_access && !access.is_subplan() => {
            let inner = access.child.take().map(|b| *b);
            let sort = SortNode::new(items.to_vec(), inner);
            access.child = Some(Box::new(sort.into_node()));
            RelNode::Access(access)
        }
        other => SortNode::new(items.to_vec(), Some(other)).into_node(),
    }
}
