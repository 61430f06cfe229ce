//! 连接节点
//!
//! 子节点顺序承载语义：第一个子节点是左侧。
//! 执行策略由优化规则写入，未写入时转换器回退嵌套循环。

use crate::core::expression::Expression;
use crate::core::symbol::SymbolMap;
use crate::define_rel_node;
use crate::query::command::{JoinType, OrderByItem};
use crate::query::planner::plan::nodes::RelNode;

/// 连接执行策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinStrategy {
    #[default]
    NestedLoop,
    Merge,
    EnhancedMerge,
    /// 相关 FROM 子查询的嵌套表策略
    NestedTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    Left,
    Right,
}

define_rel_node! {
    pub struct JoinNode {
        pub join_type: JoinType,
        /// 连接条件合取项；非等值残余谓词随节点进入执行算子
        pub criteria: Vec<Expression>,
        pub strategy: JoinStrategy,
        /// 归并类策略两侧各自的排序要求
        pub left_sort: Option<Vec<OrderByItem>>,
        pub right_sort: Option<Vec<OrderByItem>>,
        /// 依赖连接的被驱动侧
        pub dependent_side: Option<JoinSide>,
        /// 嵌套表策略下两侧的相关引用映射
        pub left_correlation: Option<SymbolMap>,
        pub right_correlation: Option<SymbolMap>,
        /// optional 提示：无引用时可整体裁剪
        pub optional: bool,
        pub left: Box<RelNode>,
        pub right: Box<RelNode>,
    }
    enum: Join
}

impl JoinNode {
    pub fn new(join_type: JoinType, left: RelNode, right: RelNode) -> Self {
        Self {
            id: -1,
            join_type,
            criteria: Vec::new(),
            strategy: JoinStrategy::default(),
            left_sort: None,
            right_sort: None,
            dependent_side: None,
            left_correlation: None,
            right_correlation: None,
            optional: false,
            left: Box::new(left),
            right: Box::new(right),
            output_cols: Vec::new(),
            estimates: Default::default(),
            groups: Vec::new(),
        }
    }

    pub fn with_criteria(mut self, criteria: Vec<Expression>) -> Self {
        self.criteria = criteria;
        self
    }

    /// 等值连接条件（左右各取一个列引用的 = 谓词）
    pub fn equality_criteria(&self) -> Vec<&Expression> {
        self.criteria
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    Expression::Binary {
                        op: crate::core::expression::BinaryOperator::Eq,
                        left,
                        right,
                    } if left.is_element() && right.is_element()
                )
            })
            .collect()
    }

    /// 非等值残余谓词
    pub fn residual_criteria(&self) -> Vec<&Expression> {
        let equalities: Vec<*const Expression> = self
            .equality_criteria()
            .into_iter()
            .map(|e| e as *const Expression)
            .collect();
        self.criteria
            .iter()
            .filter(|c| !equalities.contains(&(*c as *const Expression)))
            .collect()
    }
}
