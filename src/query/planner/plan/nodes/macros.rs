//! 计划节点宏定义
//!
//! 提供宏来生成节点的公共字段与访问器，减少样板代码。
//! 公共字段：节点 ID、输出列、成本估计、依赖的组集合。

/// 定义计划节点的宏
///
/// # 示例
/// ```ignore
/// define_rel_node! {
///     pub struct SelectNode {
///         criteria: Expression,
///     }
///     enum: Select
/// }
/// ```
#[macro_export]
macro_rules! define_rel_node {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $($(#[$field_meta:meta])* pub $field:ident: $type:ty),* $(,)?
        }
        enum: $variant:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            id: i64,
            $($(#[$field_meta])* pub $field: $type,)*
            output_cols: Vec<$crate::core::symbol::ElementSymbol>,
            estimates: $crate::query::planner::plan::nodes::CostEstimates,
            groups: Vec<$crate::core::symbol::GroupSymbol>,
        }

        impl $name {
            pub fn id(&self) -> i64 {
                self.id
            }

            pub fn set_id(&mut self, id: i64) {
                self.id = id;
            }

            pub fn type_name(&self) -> &'static str {
                stringify!($variant)
            }

            pub fn output_cols(&self) -> &[$crate::core::symbol::ElementSymbol] {
                &self.output_cols
            }

            pub fn set_output_cols(
                &mut self,
                cols: Vec<$crate::core::symbol::ElementSymbol>,
            ) {
                self.output_cols = cols;
            }

            pub fn estimates(&self) -> &$crate::query::planner::plan::nodes::CostEstimates {
                &self.estimates
            }

            pub fn estimates_mut(
                &mut self,
            ) -> &mut $crate::query::planner::plan::nodes::CostEstimates {
                &mut self.estimates
            }

            pub fn groups(&self) -> &[$crate::core::symbol::GroupSymbol] {
                &self.groups
            }

            pub fn add_group(&mut self, group: $crate::core::symbol::GroupSymbol) {
                if !self.groups.contains(&group) {
                    self.groups.push(group);
                }
            }

            pub fn set_groups(&mut self, groups: Vec<$crate::core::symbol::GroupSymbol>) {
                self.groups = groups;
            }

            pub fn into_node(self) -> $crate::query::planner::plan::nodes::RelNode {
                $crate::query::planner::plan::nodes::RelNode::$variant(self)
            }
        }
    };
}
