//! 条件复制规则
//!
//! 沿连接等值条件把单列常量谓词复制到另一列上，
//! 给两侧都制造下推机会。已存在的等价谓词不再重复制造。

use std::collections::HashSet;

use crate::core::error::CompileResult;
use crate::core::expression::{BinaryOperator, Expression};
use crate::core::symbol::ElementSymbol;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::{RelNode, SelectNode};
use crate::query::planner::plan::NodeMask;

#[derive(Debug)]
pub struct CopyCriteriaRule;

impl OptimizerRule for CopyCriteriaRule {
    fn id(&self) -> RuleId {
        RuleId::CopyCriteria
    }

    fn execute(&self, root: RelNode, _ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        // 连接等值对 (双向)
        let mut pairs: Vec<(ElementSymbol, ElementSymbol)> = Vec::new();
        for join in root.find_nodes(NodeMask::JOIN) {
            if let RelNode::Join(j) = join {
                for eq in j.equality_criteria() {
                    if let Expression::Binary { left, right, .. } = eq {
                        if let (Some(l), Some(r)) = (left.as_element(), right.as_element()) {
                            pairs.push((l.clone(), r.clone()));
                            pairs.push((r.clone(), l.clone()));
                        }
                    }
                }
            }
        }
        if pairs.is_empty() {
            return Ok(root);
        }

        // 已有谓词的指纹，避免重复制造
        let mut existing: HashSet<String> = HashSet::new();
        for select in root.find_nodes(NodeMask::SELECT) {
            if let RelNode::Select(s) = select {
                existing.insert(s.criteria.to_string());
            }
        }

        root.transform(&mut |node| {
            let select = match node {
                RelNode::Select(s) => s,
                other => return Ok(other),
            };

            let copied = copyable(&select.criteria, &pairs)
                .filter(|c| !existing.contains(&c.to_string()));
            match copied {
                Some(copy) => {
                    existing.insert(copy.to_string());
                    log::debug!("沿连接等值复制谓词: {}", copy);
                    let groups = copy
                        .elements()
                        .iter()
                        .filter_map(|e| e.group().cloned())
                        .collect();
                    let mut new_select =
                        SelectNode::new(copy, Some(select.into_node()));
                    new_select.set_groups(groups);
                    Ok(new_select.into_node())
                }
                None => Ok(RelNode::Select(select)),
            }
        })
    }
}

/// `col op 常量` 且 col 在等值对里时给出替换后的副本
fn copyable(
    criteria: &Expression,
    pairs: &[(ElementSymbol, ElementSymbol)],
) -> Option<Expression> {
    if let Expression::Binary { left, op, right } = criteria {
        if op.is_comparison() && *op != BinaryOperator::NotEq {
            if let (Some(element), Expression::Constant(c)) =
                (left.as_element(), right.as_ref())
            {
                let (_, target) = pairs.iter().find(|(from, _)| from == element)?;
                return Some(Expression::Binary {
                    left: Box::new(Expression::Element(target.clone())),
                    op: *op,
                    right: Box::new(Expression::Constant(c.clone())),
                });
            }
        }
    }
    None
}
