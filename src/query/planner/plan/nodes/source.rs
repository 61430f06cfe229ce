//! 来源节点
//!
//! 表/视图引用、表值函数或原始变更命令的占位。虚拟来源通过
//! 符号映射记录外层列与内层投影的对应关系，改名传播与条件
//! 穿透都经由这张映射。

use crate::core::symbol::{GroupSymbol, SymbolMap};
use crate::define_rel_node;
use crate::query::command::{Command, TableFunction};
use crate::query::planner::plan::nodes::RelNode;

define_rel_node! {
    pub struct SourceNode {
        pub group: Option<GroupSymbol>,
        /// 虚拟来源：外层列 -> 内层投影表达式
        pub symbol_map: Option<SymbolMap>,
        /// 变更/过程命令占位（PROJECT-over-SOURCE 形态）
        pub command: Option<Command>,
        pub table_function: Option<TableFunction>,
        /// MAKE DEP / MAKE NOT DEP 提示，访问放置时复制到访问节点
        pub dependent_hint: Option<bool>,
        pub child: Option<Box<RelNode>>,
    }
    enum: Source
}

impl SourceNode {
    pub fn for_group(group: GroupSymbol) -> Self {
        let mut node = Self::empty();
        node.add_group(group.clone());
        node.group = Some(group);
        node
    }

    pub fn for_command(command: Command) -> Self {
        let mut node = Self::empty();
        node.command = Some(command);
        node
    }

    pub fn for_table_function(name: GroupSymbol, function: TableFunction) -> Self {
        let mut node = Self::empty();
        node.add_group(name.clone());
        node.group = Some(name);
        node.table_function = Some(function);
        node
    }

    fn empty() -> Self {
        Self {
            id: -1,
            group: None,
            symbol_map: None,
            command: None,
            table_function: None,
            dependent_hint: None,
            child: None,
            output_cols: Vec::new(),
            estimates: Default::default(),
            groups: Vec::new(),
        }
    }

    pub fn set_child(&mut self, child: RelNode) {
        self.child = Some(Box::new(child));
    }

    pub fn is_virtual(&self) -> bool {
        self.symbol_map.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_for_group_records_group() {
        let node = SourceNode::for_group(GroupSymbol::new("pm1.g1"));
        assert_eq!(node.groups().len(), 1);
        assert!(!node.is_virtual());
    }
}
