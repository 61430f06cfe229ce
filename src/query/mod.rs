//! 查询编译子系统
//!
//! 完整的编译管线：已解析命令 → 规范计划树 → 规则优化 →
//! 可执行算子树。每次编译请求独占一个 [`PlanEnv`]，嵌套命令的
//! 递归编译在同一调用栈上共享它（ID 生成器因此覆盖整个计划森林）。

pub mod command;
pub mod context;
pub mod metadata;
pub mod optimizer;
pub mod planner;
pub mod process;

use std::sync::Arc;

use crate::config::PlannerConfig;
use crate::core::error::CompileResult;
use crate::query::command::Command;
use crate::query::context::CommandContext;
use crate::query::metadata::{
    AnalysisRecord, Annotation, CapabilityFinder, CatalogMetadata, Severity,
};
use crate::query::planner::plan::IdGenerator;
use crate::query::process::{ProcessorPlan, RelationalOperator};

/// 单次编译请求独占的环境
pub struct PlanEnv {
    pub metadata: Arc<dyn CatalogMetadata>,
    pub capabilities: Arc<dyn CapabilityFinder>,
    pub context: CommandContext,
    pub config: PlannerConfig,
    pub sink: Arc<AnalysisRecord>,
    pub ids: IdGenerator,
}

impl PlanEnv {
    pub fn new(
        metadata: Arc<dyn CatalogMetadata>,
        capabilities: Arc<dyn CapabilityFinder>,
        context: CommandContext,
        config: PlannerConfig,
    ) -> Self {
        let sink = Arc::new(AnalysisRecord::new(config.record_debug));
        Self {
            metadata,
            capabilities,
            context,
            config,
            sink,
            ids: IdGenerator::new(),
        }
    }
}

/// 编译一条顶层或嵌套命令为可执行算子树
pub fn compile(command: Command, env: &mut PlanEnv) -> CompileResult<ProcessorPlan> {
    log::debug!(
        "开始编译命令, request_id={}",
        env.context.request_id
    );

    let planned = planner::RelationalPlanner::new(env).plan(command)?;
    let hints = planned.hints;

    if env.sink.records_debug() {
        env.sink.record_line(format!(
            "canonical plan:\n{}",
            serde_json::to_string_pretty(&planner::plan::describe(&planned.root))
                .unwrap_or_default()
        ));
    }

    let optimized = optimizer::execute_rules(planned.root, &hints, env)?;
    optimizer::validate::validate_plan(&optimized)?;

    // WITH 下推的最终复核：用优化后的外层计划重新检查，
    // 失败时静默回退为运行期求值的 WITH
    let mut with_pushdown = false;
    if let Some(model) = &planned.cte_model {
        if plan_pushes_to_model(&optimized, model) {
            with_pushdown = true;
        } else {
            env.sink.annotate(Annotation::new(
                "common-table-expression",
                "WITH 列表无法随外层查询下推，回退为运行期求值",
                Severity::Low,
            ));
        }
    }

    let mut plan = process::convert(optimized, env)?;
    plan.with = planned.with_items;
    plan.with_pushdown = with_pushdown;

    if env.sink.records_debug() {
        env.sink.record_line(format!(
            "operator tree:\n{}",
            serde_json::to_string_pretty(&plan.root.describe()).unwrap_or_default()
        ));
    }

    log::debug!(
        "编译完成, request_id={}, 算子数={}",
        env.context.request_id,
        plan.root.count_operators()
    );
    Ok(plan)
}

/// 优化后的计划是否整体下推到给定模型
fn plan_pushes_to_model(
    root: &crate::query::planner::plan::RelNode,
    model: &str,
) -> bool {
    use crate::query::planner::plan::{NodeMask, RelNode};

    let accesses = root.find_nodes(NodeMask::ACCESS);
    accesses.len() == 1
        && matches!(
            accesses[0],
            RelNode::Access(a) if a.model.as_deref() == Some(model)
        )
}

/// 顶层便捷入口：构造环境并编译
pub fn compile_command(
    command: Command,
    metadata: Arc<dyn CatalogMetadata>,
    capabilities: Arc<dyn CapabilityFinder>,
    context: CommandContext,
    config: PlannerConfig,
) -> CompileResult<(ProcessorPlan, Arc<AnalysisRecord>)> {
    let mut env = PlanEnv::new(metadata, capabilities, context, config);
    let plan = compile(command, &mut env)?;
    Ok((plan, env.sink))
}


/// 判断一个已编译子计划是否为针对单一模型的可下推查询
pub(crate) fn pushable_model(plan: &ProcessorPlan) -> Option<String> {
    match &plan.root {
        RelationalOperator::Access {
            model: Some(m),
            command,
            ..
        } if command.is_query() => Some(m.clone()),
        _ => None,
    }
}
