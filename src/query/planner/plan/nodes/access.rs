//! 访问节点
//!
//! 表示一段将在外部数据源内执行的工作。优化过程中访问节点
//! 被逐步上提吞并可下推的算子；收拢规则最终在这里合成
//! 下推命令。包裹已独立编译的嵌套命令时持有不透明子计划。

use crate::core::symbol::SymbolMap;
use crate::define_rel_node;
use crate::query::command::Command;
use crate::query::planner::plan::nodes::RelNode;
use crate::query::process::ProcessorPlan;

define_rel_node! {
    pub struct AccessNode {
        /// 归属的数据源模型；独立子计划没有模型
        pub model: Option<String>,
        /// 收拢后的下推命令
        pub command: Option<Command>,
        /// 已独立编译的嵌套命令/过程子计划
        pub nested_plan: Option<Box<ProcessorPlan>>,
        /// 依赖连接驱动调用时的相关引用映射
        pub correlated_refs: Option<SymbolMap>,
        /// MAKE DEP / MAKE NOT DEP 提示
        pub dependent_hint: Option<bool>,
        pub child: Option<Box<RelNode>>,
    }
    enum: Access
}

impl AccessNode {
    pub fn new(model: Option<String>, child: Option<RelNode>) -> Self {
        Self {
            id: -1,
            model,
            command: None,
            nested_plan: None,
            correlated_refs: None,
            dependent_hint: None,
            child: child.map(Box::new),
            output_cols: Vec::new(),
            estimates: Default::default(),
            groups: Vec::new(),
        }
    }

    pub fn for_subplan(plan: ProcessorPlan) -> Self {
        Self {
            id: -1,
            model: None,
            command: None,
            nested_plan: Some(Box::new(plan)),
            correlated_refs: None,
            dependent_hint: None,
            child: None,
            output_cols: Vec::new(),
            estimates: Default::default(),
            groups: Vec::new(),
        }
    }

    pub fn is_subplan(&self) -> bool {
        self.nested_plan.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_node_model() {
        let node = AccessNode::new(Some("source1".into()), None);
        assert_eq!(node.model.as_deref(), Some("source1"));
        assert!(!node.is_subplan());
        assert_eq!(node.type_name(), "Access");
    }
}
