//! 关系规划器
//!
//! 把一条已解析的命令翻译为规范（未优化）计划树，递归处理
//! 所有嵌套命令；同时计算特征提示、织入行/列安全，并在建树
//! 完成后分发依赖连接提示。

pub mod alias;
pub mod hints;
pub mod partition;
pub mod plan;
pub mod relational;
pub mod security;

pub use alias::AliasGenerator;
pub use hints::PlanHints;
pub use relational::RelationalPlanner;
pub use security::{MutationCompensation, SecurityInjector};
