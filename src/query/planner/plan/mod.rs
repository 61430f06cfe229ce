//! 计划树模型
//!
//! 共享的可变中间表示：带类型标签的节点变体、类型掩码查找、
//! ID 生成与计划描述。

pub mod explain;
pub mod id_generator;
pub mod nodes;

pub use explain::{describe, Pair, PlanDescription};
pub use id_generator::IdGenerator;
pub use nodes::{
    AccessNode, CostEstimates, DupRemoveNode, GroupNode, IntoTarget, JoinNode, JoinSide,
    JoinStrategy, NodeMask, NodeTag, NullNode, ProjectNode, RelNode, SelectNode, SetOpNode,
    SortNode, SourceNode, TupleLimitNode,
};
