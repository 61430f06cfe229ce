//! 条件表达式工具
//!
//! 提供 AND 合取的拆分/合并与按谓词分割过滤条件的实用函数。

use crate::core::expression::{BinaryOperator, Expression};

/// 把条件按顶层 AND 拆分为合取项列表
pub fn separate_criteria(criteria: &Expression) -> Vec<Expression> {
    let mut parts = Vec::new();
    separate_into(criteria, &mut parts);
    parts
}

fn separate_into(criteria: &Expression, parts: &mut Vec<Expression>) {
    match criteria {
        Expression::Binary {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            separate_into(left, parts);
            separate_into(right, parts);
        }
        other => parts.push(other.clone()),
    }
}

/// 把合取项列表组合回一个条件；空列表得到 TRUE
pub fn combine_criteria(parts: Vec<Expression>) -> Expression {
    let mut iter = parts.into_iter();
    match iter.next() {
        None => Expression::TRUE,
        Some(first) => iter.fold(first, Expression::and),
    }
}

/// 将过滤条件分割为满足 picker 的部分和其余部分
///
/// 只在顶层合取粒度上分割，单个合取项不会被拆开。
pub fn split_criteria(
    criteria: &Expression,
    picker: impl Fn(&Expression) -> bool,
) -> (Option<Expression>, Option<Expression>) {
    let mut picked = Vec::new();
    let mut unpicked = Vec::new();

    for conjunct in separate_criteria(criteria) {
        if picker(&conjunct) {
            picked.push(conjunct);
        } else {
            unpicked.push(conjunct);
        }
    }

    let build = |v: Vec<Expression>| {
        if v.is_empty() {
            None
        } else {
            Some(combine_criteria(v))
        }
    };
    (build(picked), build(unpicked))
}

/// 合取项是否只引用给定组集合内的列
pub fn references_only(conjunct: &Expression, groups: &[String]) -> bool {
    if conjunct.has_subquery() {
        return false;
    }
    conjunct
        .group_names()
        .iter()
        .all(|g| groups.iter().any(|allowed| allowed == g))
}
