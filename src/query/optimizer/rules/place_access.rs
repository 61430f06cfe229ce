//! 访问放置规则
//!
//! 为每个引用物理组或持有原始命令的来源节点套上访问节点，
//! 标记归属的数据源模型。虚拟来源不放置。规范树里的依赖提示
//! 随放置复制到访问节点。

use crate::core::error::CompileResult;
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::{AccessNode, RelNode};

#[derive(Debug)]
pub struct PlaceAccessRule;

impl OptimizerRule for PlaceAccessRule {
    fn id(&self) -> RuleId {
        RuleId::PlaceAccess
    }

    fn execute(&self, root: RelNode, ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        let metadata = ctx.env.metadata.clone();
        let mut placed_any = false;

        let mut root = root.transform(&mut |node| {
            let source = match &node {
                RelNode::Source(s) => s,
                _ => return Ok(node),
            };
            // 虚拟来源（符号映射/表值函数）留在引擎侧
            if source.symbol_map.is_some() || source.table_function.is_some() {
                return Ok(node);
            }
            if source.group.is_none() && source.command.is_none() {
                return Ok(node);
            }
            // 带子计划的变更来源（INSERT…SELECT）由转换器直接处理，
            // 子计划属于引擎侧，不能一起圈进访问
            if source.command.is_some() && source.child.is_some() {
                return Ok(node);
            }

            let model = match &source.group {
                Some(group) => metadata.model_name(group).unwrap_or(None),
                None => None,
            };

            let dependent_hint = source.dependent_hint;
            let groups = source.groups().to_vec();
            let output = source.output_cols().to_vec();

            let mut access = AccessNode::new(model, Some(node));
            access.dependent_hint = dependent_hint;
            access.set_groups(groups);
            access.set_output_cols(output);
            placed_any = true;
            Ok(access.into_node())
        })?;

        // 新建的访问节点补分配 ID
        if placed_any {
            root = root.transform(&mut |mut node| {
                if matches!(node, RelNode::Access(_)) && node.id() < 0 {
                    node.set_id(ctx.env.ids.next_id());
                }
                Ok(node)
            })?;
        }
        Ok(root)
    }
}
