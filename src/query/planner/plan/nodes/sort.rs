//! 排序、去重与行数限制节点

use crate::core::expression::Expression;
use crate::define_rel_node;
use crate::query::command::OrderByItem;
use crate::query::planner::plan::nodes::RelNode;

define_rel_node! {
    pub struct SortNode {
        pub items: Vec<OrderByItem>,
        /// 排序同时去重（集合语义的 INTERSECT/EXCEPT 输入）
        pub distinct: bool,
        pub child: Option<Box<RelNode>>,
    }
    enum: Sort
}

impl SortNode {
    pub fn new(items: Vec<OrderByItem>, child: Option<RelNode>) -> Self {
        Self {
            id: -1,
            items,
            distinct: false,
            child: child.map(Box::new),
            output_cols: Vec::new(),
            estimates: Default::default(),
            groups: Vec::new(),
        }
    }
}

define_rel_node! {
    pub struct DupRemoveNode {
        pub child: Option<Box<RelNode>>,
    }
    enum: DupRemove
}

impl DupRemoveNode {
    pub fn new(child: Option<RelNode>) -> Self {
        Self {
            id: -1,
            child: child.map(Box::new),
            output_cols: Vec::new(),
            estimates: Default::default(),
            groups: Vec::new(),
        }
    }
}

define_rel_node! {
    pub struct TupleLimitNode {
        /// 先跳过 offset 行，再取 limit 行
        pub offset: Option<Expression>,
        pub limit: Option<Expression>,
        pub child: Option<Box<RelNode>>,
    }
    enum: TupleLimit
}

impl TupleLimitNode {
    pub fn new(
        offset: Option<Expression>,
        limit: Option<Expression>,
        child: Option<RelNode>,
    ) -> Self {
        Self {
            id: -1,
            offset,
            limit,
            child: child.map(Box::new),
            output_cols: Vec::new(),
            estimates: Default::default(),
            groups: Vec::new(),
        }
    }
}
