//! 目录符号
//!
//! 组符号与列符号是指向外部目录元数据的不透明句柄，
//! 各自携带一个可变的“输出名”，用于 SQL 重新生成时改名，
//! 与目录解析出的身份相互独立。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::expression::Expression;
use crate::core::value::DataType;

/// 表引用符号
///
/// `name` 是查询内的引用名（可能是别名），`definition` 在别名场景下
/// 记录实际的目录对象名；`output_name` 由别名生成器改写。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSymbol {
    name: String,
    definition: Option<String>,
    output_name: Option<String>,
    is_virtual: bool,
    is_procedure: bool,
}

impl GroupSymbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: None,
            output_name: None,
            is_virtual: false,
            is_procedure: false,
        }
    }

    pub fn with_definition(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: Some(definition.into()),
            output_name: None,
            is_virtual: false,
            is_procedure: false,
        }
    }

    pub fn virtual_group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: None,
            output_name: None,
            is_virtual: true,
            is_procedure: false,
        }
    }

    pub fn procedure(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: None,
            output_name: None,
            is_virtual: false,
            is_procedure: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    /// 目录身份：有定义时取定义，否则取名字
    pub fn canonical_name(&self) -> &str {
        self.definition.as_deref().unwrap_or(&self.name)
    }

    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    pub fn is_procedure(&self) -> bool {
        self.is_procedure
    }

    /// SQL 重生成时使用的名字
    pub fn output_name(&self) -> &str {
        self.output_name.as_deref().unwrap_or(&self.name)
    }

    pub fn set_output_name(&mut self, name: impl Into<String>) {
        self.output_name = Some(name.into());
    }

    pub fn reset_output_name(&mut self) {
        self.output_name = None;
    }
}

impl PartialEq for GroupSymbol {
    fn eq(&self, other: &Self) -> bool {
        // 身份比较不看输出名
        self.name == other.name && self.definition == other.definition
    }
}

impl Eq for GroupSymbol {}

impl std::hash::Hash for GroupSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.definition.hash(state);
    }
}

impl fmt::Display for GroupSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.definition {
            Some(def) => write!(f, "{} AS {}", def, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// 列引用符号
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSymbol {
    /// 完整名，形如 `g1.e1`
    name: String,
    group: Option<GroupSymbol>,
    data_type: DataType,
    output_name: Option<String>,
}

impl ElementSymbol {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            group: None,
            data_type,
            output_name: None,
        }
    }

    pub fn with_group(
        name: impl Into<String>,
        group: GroupSymbol,
        data_type: DataType,
    ) -> Self {
        Self {
            name: name.into(),
            group: Some(group),
            data_type,
            output_name: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 去掉组限定的短名
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn group(&self) -> Option<&GroupSymbol> {
        self.group.as_ref()
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn output_name(&self) -> &str {
        self.output_name.as_deref().unwrap_or_else(|| self.short_name())
    }

    pub fn set_output_name(&mut self, name: impl Into<String>) {
        self.output_name = Some(name.into());
    }

    pub fn reset_output_name(&mut self) {
        self.output_name = None;
    }
}

impl PartialEq for ElementSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.group == other.group
    }
}

impl Eq for ElementSymbol {}

impl std::hash::Hash for ElementSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.group.hash(state);
    }
}

impl fmt::Display for ElementSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// 有序且键唯一的表达式映射
///
/// 描述嵌套命令的投影列与外层组列的对应关系，
/// 以及相关子查询跨边界的引用替换。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolMap {
    entries: Vec<(Expression, Expression)>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一个映射项；键已存在时返回 false 并保留旧值
    pub fn insert(&mut self, key: Expression, value: Expression) -> bool {
        if self.entries.iter().any(|(k, _)| *k == key) {
            return false;
        }
        self.entries.push((key, value));
        true
    }

    pub fn get(&self, key: &Expression) -> Option<&Expression> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Expression> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn entries(&self) -> &[(Expression, Expression)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 在表达式中把所有键出现替换为对应的值
    pub fn apply(&self, expr: &Expression) -> Expression {
        if let Some(mapped) = self.get(expr) {
            return mapped.clone();
        }
        expr.map_children(|child| self.apply(child))
    }
}
