//! 选择节点
//!
//! 一个节点承载一个合取项；规划器在建树时就把 WHERE 拆成
//! AND 合取链，方便规则独立下推每个条件。

use crate::core::expression::Expression;
use crate::core::symbol::SymbolMap;
use crate::define_rel_node;
use crate::query::planner::plan::nodes::RelNode;

define_rel_node! {
    pub struct SelectNode {
        pub criteria: Expression,
        /// HAVING 来源的条件要等聚合完成后才能求值
        pub is_having: bool,
        /// 条件内各子查询容器的相关引用映射，按容器出现顺序对齐；
        /// 空映射表示不相关，EXISTS/标量子查询只求值一次
        pub subquery_correlations: Vec<SymbolMap>,
        pub child: Option<Box<RelNode>>,
    }
    enum: Select
}

impl SelectNode {
    pub fn new(criteria: Expression, child: Option<RelNode>) -> Self {
        Self {
            id: -1,
            criteria,
            is_having: false,
            subquery_correlations: Vec::new(),
            child: child.map(Box::new),
            output_cols: Vec::new(),
            estimates: Default::default(),
            groups: Vec::new(),
        }
    }

    pub fn having(criteria: Expression, child: Option<RelNode>) -> Self {
        let mut node = Self::new(criteria, child);
        node.is_having = true;
        node
    }

    /// 第 i 个子查询容器是否只需求值一次
    pub fn evaluate_once(&self, index: usize) -> bool {
        self.subquery_correlations
            .get(index)
            .map(|m| m.is_empty())
            .unwrap_or(false)
    }
}
