//! 行/列安全策略元数据
//!
//! 外部配置的访问控制元数据。条件与掩码表达式在进入规划器前
//! 已完成解析与绑定；条件为 None 表示无条件授权（TRUE）。

use std::collections::HashMap;

use crate::core::expression::Expression;

/// 行级过滤策略
#[derive(Debug, Clone, PartialEq)]
pub struct RowPolicy {
    pub name: String,
    /// None 表示无条件放行
    pub condition: Option<Expression>,
}

impl RowPolicy {
    pub fn new(name: impl Into<String>, condition: Option<Expression>) -> Self {
        Self {
            name: name.into(),
            condition,
        }
    }
}

/// 列掩码策略
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMaskPolicy {
    pub name: String,
    /// None 表示无条件应用掩码
    pub condition: Option<Expression>,
    pub mask: Expression,
    /// 显式优先级，高者先匹配；相同时按声明顺序
    pub priority: i32,
}

/// 当前会话生效的策略集合
///
/// 行策略按表的目录名键入，掩码策略按 `表名.列短名` 键入。
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    row_policies: HashMap<String, Vec<RowPolicy>>,
    mask_policies: HashMap<String, Vec<ColumnMaskPolicy>>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row_policy(&mut self, table: &str, policy: RowPolicy) {
        self.row_policies
            .entry(table.to_string())
            .or_default()
            .push(policy);
    }

    pub fn add_mask_policy(&mut self, table: &str, column: &str, policy: ColumnMaskPolicy) {
        self.mask_policies
            .entry(format!("{}.{}", table, column))
            .or_default()
            .push(policy);
    }

    /// 表的行策略，按声明顺序
    pub fn row_policies(&self, table: &str) -> &[RowPolicy] {
        self.row_policies
            .get(table)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// 列的掩码策略，按声明顺序
    pub fn mask_policies(&self, table: &str, column: &str) -> &[ColumnMaskPolicy] {
        self.mask_policies
            .get(&format!("{}.{}", table, column))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_row_policies(&self, table: &str) -> bool {
        !self.row_policies(table).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.row_policies.is_empty() && self.mask_policies.is_empty()
    }

    /// 策略配置指纹，作为派生缓存键的一部分
    ///
    /// 不同策略集合不能命中彼此的缓存条目。
    pub fn fingerprint(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        let mut row_keys: Vec<_> = self.row_policies.keys().collect();
        row_keys.sort();
        for key in row_keys {
            key.hash(&mut hasher);
            for p in &self.row_policies[key] {
                p.name.hash(&mut hasher);
                format!("{:?}", p.condition).hash(&mut hasher);
            }
        }
        let mut mask_keys: Vec<_> = self.mask_policies.keys().collect();
        mask_keys.sort();
        for key in mask_keys {
            key.hash(&mut hasher);
            for p in &self.mask_policies[key] {
                p.name.hash(&mut hasher);
                p.priority.hash(&mut hasher);
                format!("{:?}", p.mask).hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}
