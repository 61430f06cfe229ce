//! 表达式改写与化简
//!
//! 标准化简遍：常量折叠、布尔吸收、双重否定消除、
//! CASE 静态假分支剪除。安全注入器在替换掩码表达式前统一走这一遍，
//! 优化规则也可以直接调用。

use crate::core::expression::{BinaryOperator, Expression, UnaryOperator};
use crate::core::value::Value;

/// 自底向上化简表达式
pub fn simplify(expr: &Expression) -> Expression {
    let expr = expr.map_children(simplify);

    match expr {
        Expression::Binary {
            ref left,
            op: BinaryOperator::And,
            ref right,
        } => {
            if left.is_true_constant() {
                return (**right).clone();
            }
            if right.is_true_constant() {
                return (**left).clone();
            }
            if left.is_false_constant() || right.is_false_constant() {
                return Expression::FALSE;
            }
            expr
        }
        Expression::Binary {
            ref left,
            op: BinaryOperator::Or,
            ref right,
        } => {
            if left.is_false_constant() {
                return (**right).clone();
            }
            if right.is_false_constant() {
                return (**left).clone();
            }
            if left.is_true_constant() || right.is_true_constant() {
                return Expression::TRUE;
            }
            expr
        }
        Expression::Binary {
            ref left,
            op,
            ref right,
        } if op.is_comparison() => match (left.as_ref(), right.as_ref()) {
            (Expression::Constant(l), Expression::Constant(r))
                if !l.is_null() && !r.is_null() =>
            {
                match fold_comparison(l, op, r) {
                    Some(b) => Expression::Constant(Value::Boolean(b)),
                    None => expr,
                }
            }
            _ => expr,
        },
        Expression::Unary {
            op: UnaryOperator::Not,
            ref operand,
        } => match operand.as_ref() {
            Expression::Constant(Value::Boolean(b)) => Expression::Constant(Value::Boolean(!b)),
            Expression::Unary {
                op: UnaryOperator::Not,
                operand: inner,
            } => (**inner).clone(),
            _ => expr,
        },
        Expression::Unary {
            op: UnaryOperator::IsNull,
            ref operand,
        } => match operand.as_ref() {
            Expression::Constant(v) => Expression::Constant(Value::Boolean(v.is_null())),
            _ => expr,
        },
        Expression::Unary {
            op: UnaryOperator::IsNotNull,
            ref operand,
        } => match operand.as_ref() {
            Expression::Constant(v) => Expression::Constant(Value::Boolean(!v.is_null())),
            _ => expr,
        },
        Expression::Case {
            ref branches,
            ref otherwise,
        } => {
            let mut kept: Vec<(Expression, Expression)> = Vec::new();
            for (when, then) in branches {
                if when.is_false_constant() {
                    continue;
                }
                if when.is_true_constant() && kept.is_empty() {
                    // 第一个必然命中的分支：整个 CASE 退化为 THEN
                    return then.clone();
                }
                kept.push((when.clone(), then.clone()));
            }
            if kept.is_empty() {
                return otherwise
                    .as_ref()
                    .map(|e| (**e).clone())
                    .unwrap_or(Expression::Constant(Value::Null));
            }
            Expression::Case {
                branches: kept,
                otherwise: otherwise.clone(),
            }
        }
        other => other,
    }
}

fn fold_comparison(left: &Value, op: BinaryOperator, right: &Value) -> Option<bool> {
    let ord = compare_values(left, right)?;
    Some(match op {
        BinaryOperator::Eq => ord == std::cmp::Ordering::Equal,
        BinaryOperator::NotEq => ord != std::cmp::Ordering::Equal,
        BinaryOperator::Lt => ord == std::cmp::Ordering::Less,
        BinaryOperator::LtEq => ord != std::cmp::Ordering::Greater,
        BinaryOperator::Gt => ord == std::cmp::Ordering::Greater,
        BinaryOperator::GtEq => ord != std::cmp::Ordering::Less,
        _ => return None,
    })
}

/// 同类型值比较；类型不匹配或值为 NULL 时返回 None
pub fn compare_values(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        (Value::Integer(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
        (Value::Double(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol::ElementSymbol;
    use crate::core::value::DataType;

    fn col(name: &str) -> Expression {
        Expression::Element(ElementSymbol::new(name, DataType::Integer))
    }

    fn int(v: i64) -> Expression {
        Expression::Constant(Value::Integer(v))
    }

    #[test]
    fn test_true_and_absorption() {
        let e = Expression::and(Expression::TRUE, Expression::eq(col("a"), int(1)));
        assert_eq!(simplify(&e), Expression::eq(col("a"), int(1)));
    }

    #[test]
    fn test_false_or_absorption() {
        let e = Expression::or(Expression::FALSE, Expression::eq(col("a"), int(1)));
        assert_eq!(simplify(&e), Expression::eq(col("a"), int(1)));
    }

    #[test]
    fn test_constant_comparison_folds() {
        let e = Expression::eq(int(2), int(2));
        assert!(simplify(&e).is_true_constant());
        let e = Expression::eq(int(2), int(3));
        assert!(simplify(&e).is_false_constant());
    }

    #[test]
    fn test_double_negation() {
        let e = Expression::not(Expression::not(Expression::eq(col("a"), int(1))));
        assert_eq!(simplify(&e), Expression::eq(col("a"), int(1)));
    }

    #[test]
    fn test_case_prunes_false_arm() {
        let e = Expression::Case {
            branches: vec![
                (Expression::FALSE, int(1)),
                (Expression::eq(col("a"), int(1)), int(2)),
            ],
            otherwise: Some(Box::new(col("salary"))),
        };
        match simplify(&e) {
            Expression::Case { branches, .. } => assert_eq!(branches.len(), 1),
            other => panic!("expected CASE, got {:?}", other),
        }
    }

    #[test]
    fn test_case_first_true_arm_collapses() {
        let e = Expression::Case {
            branches: vec![(Expression::TRUE, int(7))],
            otherwise: Some(Box::new(col("salary"))),
        };
        assert_eq!(simplify(&e), int(7));
    }
}
