//! 编译期常量求值
//!
//! 针对字面量行镜像的三值布尔求值，供更新补偿在编译期
//! 判定行级安全过滤器是否成立。不求值函数与子查询。

use std::collections::HashMap;

use crate::core::expression::{BinaryOperator, Expression, UnaryOperator};
use crate::core::expression::rewrite::compare_values;
use crate::core::value::Value;

/// 三值逻辑结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    /// NULL 参与比较，或表达式无法在编译期求值
    Unknown,
}

impl Truth {
    pub fn from_bool(b: bool) -> Self {
        if b {
            Truth::True
        } else {
            Truth::False
        }
    }

    fn and(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            (Truth::True, Truth::True) => Truth::True,
            _ => Truth::Unknown,
        }
    }

    fn or(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::True, _) | (_, Truth::True) => Truth::True,
            (Truth::False, Truth::False) => Truth::False,
            _ => Truth::Unknown,
        }
    }

    fn not(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }
}

/// 字面量行镜像：列短名 -> 常量值
pub type RowImage = HashMap<String, Value>;

/// 对行镜像求值布尔表达式
///
/// 任何未覆盖的列、函数调用或子查询都得到 `Unknown`。
pub fn evaluate(expr: &Expression, row: &RowImage) -> Truth {
    match expr {
        Expression::Constant(Value::Boolean(b)) => Truth::from_bool(*b),
        Expression::Constant(Value::Null) => Truth::Unknown,
        Expression::Binary {
            left,
            op: BinaryOperator::And,
            right,
        } => evaluate(left, row).and(evaluate(right, row)),
        Expression::Binary {
            left,
            op: BinaryOperator::Or,
            right,
        } => evaluate(left, row).or(evaluate(right, row)),
        Expression::Binary { left, op, right } if op.is_comparison() => {
            match (resolve(left, row), resolve(right, row)) {
                (Some(l), Some(r)) => {
                    if l.is_null() || r.is_null() {
                        return Truth::Unknown;
                    }
                    match compare_values(&l, &r) {
                        Some(ord) => Truth::from_bool(match op {
                            BinaryOperator::Eq => ord == std::cmp::Ordering::Equal,
                            BinaryOperator::NotEq => ord != std::cmp::Ordering::Equal,
                            BinaryOperator::Lt => ord == std::cmp::Ordering::Less,
                            BinaryOperator::LtEq => ord != std::cmp::Ordering::Greater,
                            BinaryOperator::Gt => ord == std::cmp::Ordering::Greater,
                            BinaryOperator::GtEq => ord != std::cmp::Ordering::Less,
                            _ => unreachable!(),
                        }),
                        None => Truth::Unknown,
                    }
                }
                _ => Truth::Unknown,
            }
        }
        Expression::Unary {
            op: UnaryOperator::Not,
            operand,
        } => evaluate(operand, row).not(),
        Expression::Unary {
            op: UnaryOperator::IsNull,
            operand,
        } => match resolve(operand, row) {
            Some(v) => Truth::from_bool(v.is_null()),
            None => Truth::Unknown,
        },
        Expression::Unary {
            op: UnaryOperator::IsNotNull,
            operand,
        } => match resolve(operand, row) {
            Some(v) => Truth::from_bool(!v.is_null()),
            None => Truth::Unknown,
        },
        Expression::In {
            expr,
            list,
            negated,
        } => {
            let target = match resolve(expr, row) {
                Some(v) if !v.is_null() => v,
                _ => return Truth::Unknown,
            };
            let mut saw_unknown = false;
            for item in list {
                match resolve(item, row) {
                    Some(v) if !v.is_null() => {
                        if v == target {
                            return Truth::from_bool(!negated);
                        }
                    }
                    _ => saw_unknown = true,
                }
            }
            if saw_unknown {
                Truth::Unknown
            } else {
                Truth::from_bool(*negated)
            }
        }
        _ => Truth::Unknown,
    }
}

/// 求值为常量；列引用从行镜像按短名解析
fn resolve(expr: &Expression, row: &RowImage) -> Option<Value> {
    match expr {
        Expression::Constant(v) => Some(v.clone()),
        Expression::Element(e) => row.get(e.short_name()).cloned(),
        Expression::Cast { expr, .. } => resolve(expr, row),
        _ => None,
    }
}
