//! 条件清理规则
//!
//! 化简每个选择节点的条件：恒真的节点整个消去，恒假的子树
//! 替换为空节点，相邻的重复条件只留一个。

use crate::core::error::CompileResult;
use crate::core::expression::rewrite::simplify;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::{NullNode, RelNode};

#[derive(Debug)]
pub struct CleanCriteriaRule;

impl OptimizerRule for CleanCriteriaRule {
    fn id(&self) -> RuleId {
        RuleId::CleanCriteria
    }

    fn execute(&self, root: RelNode, _ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        root.transform(&mut |node| {
            let mut select = match node {
                RelNode::Select(s) => s,
                other => return Ok(other),
            };

            select.criteria = simplify(&select.criteria);

            if select.criteria.is_true_constant() {
                // 恒真：节点整个消去
                return Ok(match select.child.take() {
                    Some(child) => *child,
                    None => NullNode::new().into_node(),
                });
            }
            if select.criteria.is_false_constant() {
                // 恒假：子树不可能产出行
                log::debug!("条件恒假，子树折叠为空节点");
                let mut null = NullNode::new();
                null.set_id(select.id());
                null.set_output_cols(select.output_cols().to_vec());
                return Ok(null.into_node());
            }

            // 相邻重复条件
            if let Some(RelNode::Select(child)) = select.child.as_deref() {
                if child.criteria == select.criteria && child.is_having == select.is_having {
                    let mut child = match *select.child.take().unwrap() {
                        RelNode::Select(c) => c,
                        _ => unreachable!(),
                    };
                    child.set_id(select.id());
                    return Ok(child.into_node());
                }
            }

            Ok(select.into_node())
        })
    }
}
