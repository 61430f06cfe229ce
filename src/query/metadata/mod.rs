//! 元数据协作者接口
//!
//! 规划器通过这里的窄接口访问外部目录与数据源能力信息：
//! 组/列查找、模型归属、键、物化记录，以及用于记忆派生对象
//! （行过滤器、列掩码、视图计划）的单飞缓存。

pub mod analysis;
pub mod cache;
pub mod capability;
pub mod memory;
pub mod policy;

use crate::core::error::MetadataError;
use crate::core::symbol::{ElementSymbol, GroupSymbol};
use crate::query::command::Command;

pub use analysis::{AnalysisRecord, Annotation, Severity};
pub use cache::DerivedObjectCache;
pub use capability::{Capability, CapabilityFinder};
pub use memory::InMemoryCatalog;
pub use policy::{ColumnMaskPolicy, PolicySet, RowPolicy};

pub type MetadataResult<T> = Result<T, MetadataError>;

/// 视图物化记录
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializationInfo {
    /// 承载物化数据的物理表或全局临时表
    pub target: GroupSymbol,
    pub enabled: bool,
}

/// 目录元数据接口
///
/// 所有方法都是同步调用；实现方可以自行缓存。
/// 派生对象缓存的填充必须按键单飞（见 [`DerivedObjectCache`]）。
pub trait CatalogMetadata: Send + Sync {
    /// 按引用名解析组符号
    fn group(&self, name: &str) -> MetadataResult<GroupSymbol>;

    /// 组的全部列，按自然列序
    fn elements(&self, group: &GroupSymbol) -> MetadataResult<Vec<ElementSymbol>>;

    /// 组归属的数据源模型名；虚拟组返回 None
    fn model_name(&self, group: &GroupSymbol) -> MetadataResult<Option<String>>;

    /// 虚拟组（视图）的定义查询
    fn view_definition(&self, group: &GroupSymbol) -> MetadataResult<Option<Command>>;

    /// 视图的物化记录
    fn materialization(&self, group: &GroupSymbol) -> MetadataResult<Option<MaterializationInfo>>;

    /// 主键列
    fn primary_key(&self, group: &GroupSymbol) -> MetadataResult<Option<Vec<ElementSymbol>>>;

    /// 全部唯一键（含主键）
    fn unique_keys(&self, group: &GroupSymbol) -> MetadataResult<Vec<Vec<ElementSymbol>>>;

    /// 基数估计（行数）；未知返回 None
    fn cardinality(&self, group: &GroupSymbol) -> Option<f64>;

    /// 按部分名查找组（大小写不敏感的点分后缀匹配）
    fn find_group_by_partial_name(&self, partial: &str) -> MetadataResult<Option<GroupSymbol>>;

    /// 是否为内部系统目录表
    fn is_system_table(&self, group: &GroupSymbol) -> bool;

    /// 派生对象的单飞缓存
    fn derived_cache(&self) -> &DerivedObjectCache;
}
