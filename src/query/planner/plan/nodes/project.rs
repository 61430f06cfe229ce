//! 投影节点
//!
//! 承载投影表达式列表；INSERT INTO 目标也挂在这里，
//! 执行模式（迭代/批量/逐行）由转换器按目标源能力决定。

use crate::core::symbol::{ElementSymbol, GroupSymbol};
use crate::define_rel_node;
use crate::query::command::SelectItem;
use crate::query::planner::plan::nodes::RelNode;

/// INSERT INTO 目标
#[derive(Debug, Clone, PartialEq)]
pub struct IntoTarget {
    pub group: GroupSymbol,
    pub columns: Vec<ElementSymbol>,
}

define_rel_node! {
    pub struct ProjectNode {
        /// 投影表达式
        pub cols: Vec<SelectItem>,
        /// INSERT…SELECT 的写入目标
        pub into_target: Option<IntoTarget>,
        pub child: Option<Box<RelNode>>,
    }
    enum: Project
}

impl ProjectNode {
    pub fn new(cols: Vec<SelectItem>, child: Option<RelNode>) -> Self {
        Self {
            id: -1,
            cols,
            into_target: None,
            child: child.map(Box::new),
            output_cols: Vec::new(),
            estimates: Default::default(),
            groups: Vec::new(),
        }
    }

    pub fn with_into(mut self, target: IntoTarget) -> Self {
        self.into_target = Some(target);
        self
    }

    /// 把投影列整体替换为一组列引用（改名不改投影的捷径使用）
    pub fn set_cols_from_elements(&mut self, elements: &[ElementSymbol]) {
        self.cols = elements
            .iter()
            .map(|e| {
                SelectItem::new(
                    crate::core::expression::Expression::Element(e.clone()),
                    e.clone(),
                )
            })
            .collect();
    }
}
