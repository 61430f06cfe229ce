//! 已解析的表达式树
//!
//! 规划器消费的表达式已经完成名称/类型解析，这里只承载结构。
//! 子查询容器（标量子查询、EXISTS、IN-子查询）持有完整的嵌套命令，
//! 由关系规划器递归编译。

pub mod criteria;
pub mod eval;
pub mod rewrite;

use std::fmt;

use crate::core::symbol::ElementSymbol;
use crate::core::value::{DataType, Value};
use crate::query::command::Command;

/// 二元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOperator {
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
        };
        write!(f, "{}", s)
    }
}

/// 一元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    IsNull,
    IsNotNull,
    Negate,
}

/// 聚合函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        };
        write!(f, "{}", s)
    }
}

/// 表达式树
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// 常量
    Constant(Value),
    /// 列引用
    Element(ElementSymbol),
    /// 二元运算
    Binary {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    /// 一元运算
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    /// 函数调用
    Function {
        name: String,
        args: Vec<Expression>,
    },
    /// 聚合函数
    Aggregate {
        func: AggregateFunction,
        arg: Option<Box<Expression>>,
        distinct: bool,
    },
    /// IN 列表
    In {
        expr: Box<Expression>,
        list: Vec<Expression>,
        negated: bool,
    },
    /// CASE WHEN ... THEN ... ELSE
    Case {
        branches: Vec<(Expression, Expression)>,
        otherwise: Option<Box<Expression>>,
    },
    /// 类型转换
    Cast {
        expr: Box<Expression>,
        target: DataType,
    },
    /// 标量子查询
    ScalarSubquery(Box<Command>),
    /// EXISTS 子查询
    Exists {
        command: Box<Command>,
        negated: bool,
    },
    /// IN 子查询
    InSubquery {
        expr: Box<Expression>,
        command: Box<Command>,
        negated: bool,
    },
}

impl Expression {
    pub const TRUE: Expression = Expression::Constant(Value::Boolean(true));
    pub const FALSE: Expression = Expression::Constant(Value::Boolean(false));

    pub fn eq(left: Expression, right: Expression) -> Expression {
        Expression::Binary {
            left: Box::new(left),
            op: BinaryOperator::Eq,
            right: Box::new(right),
        }
    }

    pub fn and(left: Expression, right: Expression) -> Expression {
        Expression::Binary {
            left: Box::new(left),
            op: BinaryOperator::And,
            right: Box::new(right),
        }
    }

    pub fn or(left: Expression, right: Expression) -> Expression {
        Expression::Binary {
            left: Box::new(left),
            op: BinaryOperator::Or,
            right: Box::new(right),
        }
    }

    pub fn not(operand: Expression) -> Expression {
        Expression::Unary {
            op: UnaryOperator::Not,
            operand: Box::new(operand),
        }
    }

    pub fn is_true_constant(&self) -> bool {
        matches!(self, Expression::Constant(Value::Boolean(true)))
    }

    pub fn is_false_constant(&self) -> bool {
        matches!(self, Expression::Constant(Value::Boolean(false)))
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Expression::Element(_))
    }

    pub fn as_element(&self) -> Option<&ElementSymbol> {
        match self {
            Expression::Element(e) => Some(e),
            _ => None,
        }
    }

    /// 是否包含聚合函数
    pub fn has_aggregate(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| {
            if matches!(e, Expression::Aggregate { .. }) {
                found = true;
            }
        });
        found
    }

    /// 是否包含子查询容器
    pub fn has_subquery(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| {
            if matches!(
                e,
                Expression::ScalarSubquery(_)
                    | Expression::Exists { .. }
                    | Expression::InSubquery { .. }
            ) {
                found = true;
            }
        });
        found
    }

    /// 不含任何列引用与子查询时为常量表达式
    pub fn is_constant(&self) -> bool {
        let mut constant = true;
        self.visit(&mut |e| {
            if matches!(
                e,
                Expression::Element(_)
                    | Expression::ScalarSubquery(_)
                    | Expression::Exists { .. }
                    | Expression::InSubquery { .. }
            ) {
                constant = false;
            }
        });
        constant
    }

    /// 前序遍历自身与全部子表达式（不进入子查询命令内部）
    pub fn visit<F: FnMut(&Expression)>(&self, f: &mut F) {
        f(self);
        match self {
            Expression::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expression::Unary { operand, .. } => operand.visit(f),
            Expression::Function { args, .. } => {
                for a in args {
                    a.visit(f);
                }
            }
            Expression::Aggregate { arg: Some(a), .. } => a.visit(f),
            Expression::In { expr, list, .. } => {
                expr.visit(f);
                for item in list {
                    item.visit(f);
                }
            }
            Expression::Case {
                branches,
                otherwise,
            } => {
                for (when, then) in branches {
                    when.visit(f);
                    then.visit(f);
                }
                if let Some(e) = otherwise {
                    e.visit(f);
                }
            }
            Expression::Cast { expr, .. } => expr.visit(f),
            Expression::InSubquery { expr, .. } => expr.visit(f),
            _ => {}
        }
    }

    /// 对每个直接子表达式应用 `f` 并重建自身
    pub fn map_children<F: Fn(&Expression) -> Expression>(&self, f: F) -> Expression {
        match self {
            Expression::Binary { left, op, right } => Expression::Binary {
                left: Box::new(f(left)),
                op: *op,
                right: Box::new(f(right)),
            },
            Expression::Unary { op, operand } => Expression::Unary {
                op: *op,
                operand: Box::new(f(operand)),
            },
            Expression::Function { name, args } => Expression::Function {
                name: name.clone(),
                args: args.iter().map(&f).collect(),
            },
            Expression::Aggregate {
                func,
                arg,
                distinct,
            } => Expression::Aggregate {
                func: *func,
                arg: arg.as_ref().map(|a| Box::new(f(a))),
                distinct: *distinct,
            },
            Expression::In {
                expr,
                list,
                negated,
            } => Expression::In {
                expr: Box::new(f(expr)),
                list: list.iter().map(&f).collect(),
                negated: *negated,
            },
            Expression::Case {
                branches,
                otherwise,
            } => Expression::Case {
                branches: branches
                    .iter()
                    .map(|(w, t)| (f(w), f(t)))
                    .collect(),
                otherwise: otherwise.as_ref().map(|e| Box::new(f(e))),
            },
            Expression::Cast { expr, target } => Expression::Cast {
                expr: Box::new(f(expr)),
                target: *target,
            },
            Expression::InSubquery {
                expr,
                command,
                negated,
            } => Expression::InSubquery {
                expr: Box::new(f(expr)),
                command: command.clone(),
                negated: *negated,
            },
            other => other.clone(),
        }
    }

    /// 收集全部列引用
    pub fn elements(&self) -> Vec<ElementSymbol> {
        let mut out = Vec::new();
        self.visit(&mut |e| {
            if let Expression::Element(sym) = e {
                out.push(sym.clone());
            }
        });
        out
    }

    /// 收集引用到的组名（按引用名）
    pub fn group_names(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        self.visit(&mut |e| {
            if let Expression::Element(sym) = e {
                if let Some(g) = sym.group() {
                    if !out.iter().any(|n| n == g.name()) {
                        out.push(g.name().to_string());
                    }
                }
            }
        });
        out
    }

    /// 表达式的推导类型（粗粒度，足以支撑掩码类型检查）
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Constant(v) => v.data_type(),
            Expression::Element(e) => e.data_type(),
            Expression::Binary { op, left, .. } => {
                if op.is_logical() || op.is_comparison() {
                    DataType::Boolean
                } else {
                    left.data_type()
                }
            }
            Expression::Unary { op, .. } => match op {
                UnaryOperator::Negate => DataType::Double,
                _ => DataType::Boolean,
            },
            Expression::Function { .. } => DataType::Object,
            Expression::Aggregate { func, arg, .. } => match func {
                AggregateFunction::Count => DataType::Long,
                _ => arg
                    .as_ref()
                    .map(|a| a.data_type())
                    .unwrap_or(DataType::Unknown),
            },
            Expression::In { .. } => DataType::Boolean,
            Expression::Case {
                branches,
                otherwise,
            } => branches
                .first()
                .map(|(_, t)| t.data_type())
                .or_else(|| otherwise.as_ref().map(|e| e.data_type()))
                .unwrap_or(DataType::Unknown),
            Expression::Cast { target, .. } => *target,
            Expression::ScalarSubquery(_) => DataType::Object,
            Expression::Exists { .. } => DataType::Boolean,
            Expression::InSubquery { .. } => DataType::Boolean,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(v) => write!(f, "{}", v),
            Expression::Element(e) => write!(f, "{}", e),
            Expression::Binary { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expression::Unary { op, operand } => match op {
                UnaryOperator::Not => write!(f, "NOT ({})", operand),
                UnaryOperator::IsNull => write!(f, "{} IS NULL", operand),
                UnaryOperator::IsNotNull => write!(f, "{} IS NOT NULL", operand),
                UnaryOperator::Negate => write!(f, "-({})", operand),
            },
            Expression::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Expression::Aggregate {
                func,
                arg,
                distinct,
            } => {
                write!(f, "{}(", func)?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                match arg {
                    Some(a) => write!(f, "{})", a),
                    None => write!(f, "*)"),
                }
            }
            Expression::In {
                expr,
                list,
                negated,
            } => {
                write!(f, "{}{} IN (", expr, if *negated { " NOT" } else { "" })?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Expression::Case {
                branches,
                otherwise,
            } => {
                write!(f, "CASE")?;
                for (when, then) in branches {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(e) = otherwise {
                    write!(f, " ELSE {}", e)?;
                }
                write!(f, " END")
            }
            Expression::Cast { expr, target } => write!(f, "CAST({} AS {})", expr, target),
            Expression::ScalarSubquery(_) => write!(f, "(<subquery>)"),
            Expression::Exists { negated, .. } => {
                write!(f, "{}EXISTS (<subquery>)", if *negated { "NOT " } else { "" })
            }
            Expression::InSubquery { expr, negated, .. } => {
                write!(f, "{}{} IN (<subquery>)", expr, if *negated { " NOT" } else { "" })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elem(name: &str) -> Expression {
        Expression::Element(ElementSymbol::new(name, DataType::Integer))
    }

    #[test]
    fn test_constant_detection() {
        let c = Expression::and(
            Expression::eq(
                Expression::Constant(Value::Integer(1)),
                Expression::Constant(Value::Integer(1)),
            ),
            Expression::TRUE,
        );
        assert!(c.is_constant());
        assert!(!elem("g1.a").is_constant());
    }

    #[test]
    fn test_group_names_dedup() {
        let g = crate::core::symbol::GroupSymbol::new("pm1.g1");
        let a = Expression::Element(ElementSymbol::with_group(
            "pm1.g1.a",
            g.clone(),
            DataType::Integer,
        ));
        let b = Expression::Element(ElementSymbol::with_group(
            "pm1.g1.b",
            g,
            DataType::Integer,
        ));
        let e = Expression::and(a, b);
        assert_eq!(e.group_names(), vec!["pm1.g1".to_string()]);
    }

    #[test]
    fn test_comparison_type_is_boolean() {
        let e = Expression::eq(elem("g1.a"), Expression::Constant(Value::Integer(5)));
        assert_eq!(e.data_type(), DataType::Boolean);
    }
}
