//! 数据源能力接口
//!
//! 按源模型回答布尔/数值能力查询，驱动下推决策与执行模式选择。

/// 源模型能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// 支持 WHERE 谓词
    Criteria,
    /// 支持等值谓词
    EqualityPredicate,
    /// 支持 IN 列表谓词
    InPredicate,
    Join,
    OuterJoin,
    OrderBy,
    Aggregates,
    Distinct,
    RowLimit,
    RowOffset,
    Union,
    Intersect,
    Except,
    /// 可作为依赖连接的被驱动侧
    DependentJoin,
    /// INSERT 执行模式，按能力从高到低排列
    InsertWithIterator,
    BulkInsert,
    BatchedInsert,
    /// 公共表表达式下推
    CommonTableExpression,
}

/// 能力查询接口
pub trait CapabilityFinder: Send + Sync {
    fn supports(&self, model: &str, capability: Capability) -> bool;

    /// IN 列表长度上限；None 表示无限制
    fn max_in_list_size(&self, model: &str) -> Option<usize>;

    /// 依赖连接谓词数上限；None 表示无限制
    fn max_dependent_predicates(&self, model: &str) -> Option<usize>;
}

/// 放开全部能力的查询器，测试与嵌入场景使用
#[derive(Debug, Default)]
pub struct AllCapabilities;

impl CapabilityFinder for AllCapabilities {
    fn supports(&self, _model: &str, _capability: Capability) -> bool {
        true
    }

    fn max_in_list_size(&self, _model: &str) -> Option<usize> {
        None
    }

    fn max_dependent_predicates(&self, _model: &str) -> Option<usize> {
        None
    }
}

/// 按 (模型, 能力) 显式配置的查询器
#[derive(Debug, Default)]
pub struct ConfiguredCapabilities {
    granted: std::collections::HashSet<(String, Capability)>,
    in_list_limits: std::collections::HashMap<String, usize>,
    dependent_limits: std::collections::HashMap<String, usize>,
}

impl ConfiguredCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, model: &str, capability: Capability) -> &mut Self {
        self.granted.insert((model.to_string(), capability));
        self
    }

    pub fn grant_all(&mut self, model: &str, capabilities: &[Capability]) -> &mut Self {
        for c in capabilities {
            self.grant(model, *c);
        }
        self
    }

    pub fn set_max_in_list_size(&mut self, model: &str, limit: usize) -> &mut Self {
        self.in_list_limits.insert(model.to_string(), limit);
        self
    }

    pub fn set_max_dependent_predicates(&mut self, model: &str, limit: usize) -> &mut Self {
        self.dependent_limits.insert(model.to_string(), limit);
        self
    }
}

impl CapabilityFinder for ConfiguredCapabilities {
    fn supports(&self, model: &str, capability: Capability) -> bool {
        self.granted.contains(&(model.to_string(), capability))
    }

    fn max_in_list_size(&self, model: &str) -> Option<usize> {
        self.in_list_limits.get(model).copied()
    }

    fn max_dependent_predicates(&self, model: &str) -> Option<usize> {
        self.dependent_limits.get(model).copied()
    }
}
