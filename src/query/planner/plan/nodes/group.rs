//! 分组聚合节点

use crate::core::expression::Expression;
use crate::define_rel_node;
use crate::query::command::SelectItem;
use crate::query::planner::plan::nodes::RelNode;

define_rel_node! {
    pub struct GroupNode {
        pub group_cols: Vec<Expression>,
        /// 聚合表达式及其输出符号
        pub aggregates: Vec<SelectItem>,
        pub child: Option<Box<RelNode>>,
    }
    enum: Group
}

impl GroupNode {
    pub fn new(
        group_cols: Vec<Expression>,
        aggregates: Vec<SelectItem>,
        child: Option<RelNode>,
    ) -> Self {
        Self {
            id: -1,
            group_cols,
            aggregates,
            child: child.map(Box::new),
            output_cols: Vec::new(),
            estimates: Default::default(),
            groups: Vec::new(),
        }
    }
}
