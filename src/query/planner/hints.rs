//! 计划特征提示
//!
//! 建树时一次性计算的布尔特征，是规则序列构造的唯一输入；
//! 转换器从不读取。

/// 特征提示集合
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanHints {
    pub has_join: bool,
    pub has_criteria: bool,
    pub has_aggregates: bool,
    pub has_set_query: bool,
    pub has_limit: bool,
    pub has_optional_join: bool,
    pub has_relational_procedure: bool,
    pub has_virtual_groups: bool,
    pub has_function_based_columns: bool,
}

impl PlanHints {
    pub fn new() -> Self {
        Self::default()
    }
}
