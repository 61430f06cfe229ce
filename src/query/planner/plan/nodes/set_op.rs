//! 集合运算节点与空节点

use crate::define_rel_node;
use crate::query::command::SetOperation;
use crate::query::planner::partition::PartitionMap;
use crate::query::planner::plan::nodes::RelNode;

define_rel_node! {
    pub struct SetOpNode {
        pub op: SetOperation,
        pub all: bool,
        /// 联合规划规则写入的分区提示，被消费后即丢弃
        pub partition_info: Option<PartitionMap>,
        pub left: Box<RelNode>,
        pub right: Box<RelNode>,
    }
    enum: SetOp
}

impl SetOpNode {
    pub fn new(op: SetOperation, all: bool, left: RelNode, right: RelNode) -> Self {
        Self {
            id: -1,
            op,
            all,
            partition_info: None,
            left: Box::new(left),
            right: Box::new(right),
            output_cols: Vec::new(),
            estimates: Default::default(),
            groups: Vec::new(),
        }
    }
}

define_rel_node! {
    pub struct NullNode {
    }
    enum: Null
}

impl NullNode {
    pub fn new() -> Self {
        Self {
            id: -1,
            output_cols: Vec::new(),
            estimates: Default::default(),
            groups: Vec::new(),
        }
    }
}

impl Default for NullNode {
    fn default() -> Self {
        Self::new()
    }
}
