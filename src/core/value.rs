//! SQL 值域
//!
//! 规划期使用的常量值与声明类型。值需要支持相等与哈希，
//! 供分区分析器做常量集求交；浮点值按位哈希。

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 列与表达式的声明类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Integer,
    Long,
    Double,
    String,
    Date,
    Timestamp,
    /// 大对象与不透明类型，不可比较，不参与分区分析
    Blob,
    Clob,
    Xml,
    Object,
    /// 尚未解析出类型（NULL 字面量）
    Unknown,
}

impl DataType {
    /// 该类型的值是否支持可靠的相等比较
    ///
    /// 分区分析器会预先排除不可比较类型的投影列。
    pub fn is_comparable(&self) -> bool {
        !matches!(
            self,
            DataType::Blob | DataType::Clob | DataType::Xml | DataType::Object
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Long => "long",
            DataType::Double => "double",
            DataType::String => "string",
            DataType::Date => "date",
            DataType::Timestamp => "timestamp",
            DataType::Blob => "blob",
            DataType::Clob => "clob",
            DataType::Xml => "xml",
            DataType::Object => "object",
            DataType::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// 规划期常量值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Unknown,
            Value::Boolean(_) => DataType::Boolean,
            Value::Integer(_) => DataType::Integer,
            Value::Double(_) => DataType::Double,
            Value::String(_) => DataType::String,
            Value::Date(_) => DataType::Date,
            Value::Timestamp(_) => DataType::Timestamp,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Double(d) => d.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Timestamp(t) => t.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Date(d) => write!(f, "{{d'{}'}}", d),
            Value::Timestamp(t) => write!(f, "{{ts'{}'}}", t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_value_hash_in_constant_sets() {
        let mut set = HashSet::new();
        set.insert(Value::Integer(1));
        set.insert(Value::Integer(1));
        set.insert(Value::String("a".into()));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Value::Integer(1)));
    }

    #[test]
    fn test_double_bitwise_equality() {
        assert_eq!(Value::Double(1.5), Value::Double(1.5));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
    }

    #[test]
    fn test_lob_types_not_comparable() {
        assert!(!DataType::Blob.is_comparable());
        assert!(!DataType::Xml.is_comparable());
        assert!(DataType::Integer.is_comparable());
        assert!(DataType::String.is_comparable());
    }
}
