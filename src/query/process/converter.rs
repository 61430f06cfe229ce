//! 计划树到算子树的转换
//!
//! 单遍自顶向下翻译：每个计划节点按类型生成对应的执行算子，
//! 算子 ID 从编译请求共享的生成器取，成本估计原样复制。
//! 虚拟来源不生成算子，改名传播后直接递归其唯一子节点；
//! 别名生成器在物化每个访问算子前重写其下推命令。

use crate::core::error::{CompileResult, PlannerError};
use crate::core::expression::Expression;
use crate::core::symbol::ElementSymbol;
use crate::query::command::{Command, JoinType, OrderByItem, SelectItem};
use crate::query::metadata::Capability;
use crate::query::planner::plan::nodes::{
    AccessNode, JoinStrategy, ProjectNode, RelNode, SourceNode,
};
use crate::query::planner::AliasGenerator;
use crate::query::process::{
    InsertMode, JoinSemantics, JoinStrategyOp, OperatorCommon, ProcessorPlan,
    RelationalOperator, SortMode,
};
use crate::query::PlanEnv;

/// 把优化完成的计划树转换为可执行算子树
pub fn convert(root: RelNode, env: &mut PlanEnv) -> CompileResult<ProcessorPlan> {
    let output_cols = root.output_cols().to_vec();
    let root = convert_node(root, env, &Surroundings::default())?;
    Ok(ProcessorPlan {
        root,
        output_cols,
        with: Vec::new(),
        with_pushdown: false,
    })
}

/// 翻译时需要知道的父节点环境
#[derive(Debug, Clone, Copy, Default)]
struct Surroundings {
    /// 直接父节点是投影算子，系统表校正不必再插投影
    parent_is_project: bool,
    /// 处于 INTO 目标之下，虚拟来源不做改名传播
    under_into: bool,
}

fn convert_node(
    node: RelNode,
    env: &mut PlanEnv,
    surroundings: &Surroundings,
) -> CompileResult<RelationalOperator> {
    log::trace!("转换 {} 节点 (id={})", node.type_name(), node.id());
    match node {
        RelNode::Project(project) => convert_project(project, env, surroundings),
        RelNode::Access(access) => convert_access(access, env, surroundings),
        RelNode::Source(source) => convert_source(source, env, surroundings),
        RelNode::Join(mut join) => {
            let common = common_of(&join.estimates().clone(), join.output_cols().to_vec(), env);
            let strategy = match join.strategy {
                JoinStrategy::Merge => JoinStrategyOp::Merge {
                    left_sort: join.left_sort.clone().unwrap_or_default(),
                    right_sort: join.right_sort.clone().unwrap_or_default(),
                },
                JoinStrategy::EnhancedMerge => JoinStrategyOp::EnhancedMerge {
                    left_sort: join.left_sort.clone().unwrap_or_default(),
                    right_sort: join.right_sort.clone().unwrap_or_default(),
                },
                JoinStrategy::NestedTable => JoinStrategyOp::NestedTable {
                    left_correlation: join.left_correlation.take(),
                    right_correlation: join.right_correlation.take(),
                },
                JoinStrategy::NestedLoop => JoinStrategyOp::NestedLoop,
            };
            // 非等值残余谓词无论什么策略都随算子执行；
            // 嵌套循环没有排序键可用，等值条件也一并携带
            let criteria: Vec<Expression> = match join.strategy {
                JoinStrategy::Merge | JoinStrategy::EnhancedMerge => {
                    join.residual_criteria().into_iter().cloned().collect()
                }
                _ => join.criteria.clone(),
            };

            let child_env = Surroundings {
                parent_is_project: false,
                under_into: surroundings.under_into,
            };
            let left = convert_node(*join.left, env, &child_env)?;
            let right = convert_node(*join.right, env, &child_env)?;
            Ok(RelationalOperator::Join {
                common,
                join_type: join.join_type,
                strategy,
                semantics: JoinSemantics::Normal,
                criteria,
                left: Box::new(left),
                right: Box::new(right),
            })
        }
        RelNode::Select(select) => {
            let common = common_of(&select.estimates().clone(), select.output_cols().to_vec(), env);
            let child = require_child(select.child, "Select")?;
            let child = convert_node(child, env, &surroundings.for_child(false))?;
            Ok(RelationalOperator::Select {
                common,
                criteria: select.criteria,
                child: Box::new(child),
            })
        }
        RelNode::Sort(sort) => {
            let common = common_of(&sort.estimates().clone(), sort.output_cols().to_vec(), env);
            let child = require_child(sort.child, "Sort")?;
            let child = convert_node(child, env, &surroundings.for_child(false))?;
            Ok(RelationalOperator::Sort {
                common,
                items: sort.items,
                mode: if sort.distinct {
                    SortMode::SortDistinct
                } else {
                    SortMode::Sort
                },
                child: Box::new(child),
            })
        }
        RelNode::DupRemove(dup) => {
            let common = common_of(&dup.estimates().clone(), dup.output_cols().to_vec(), env);
            let child = require_child(dup.child, "DupRemove")?;
            let child = convert_node(child, env, &surroundings.for_child(false))?;
            Ok(RelationalOperator::DupRemove {
                common,
                child: Box::new(child),
            })
        }
        RelNode::Group(group) => {
            let common = common_of(&group.estimates().clone(), group.output_cols().to_vec(), env);
            let child = require_child(group.child, "Group")?;
            let child = convert_node(child, env, &surroundings.for_child(false))?;
            Ok(RelationalOperator::Group {
                common,
                group_cols: group.group_cols,
                aggregates: group.aggregates,
                child: Box::new(child),
            })
        }
        RelNode::TupleLimit(limit) => {
            let common = common_of(&limit.estimates().clone(), limit.output_cols().to_vec(), env);
            let child = require_child(limit.child, "TupleLimit")?;
            let child = convert_node(child, env, &surroundings.for_child(false))?;
            Ok(RelationalOperator::Limit {
                common,
                offset: limit.offset,
                limit: limit.limit,
                child: Box::new(child),
            })
        }
        RelNode::SetOp(set_op) => convert_set_op(set_op, env, surroundings),
        RelNode::Null(null) => {
            let common = common_of(&null.estimates().clone(), null.output_cols().to_vec(), env);
            Ok(RelationalOperator::Null { common })
        }
    }
}

impl Surroundings {
    fn for_child(&self, parent_is_project: bool) -> Surroundings {
        Surroundings {
            parent_is_project,
            under_into: self.under_into,
        }
    }
}

fn convert_project(
    mut project: ProjectNode,
    env: &mut PlanEnv,
    surroundings: &Surroundings,
) -> CompileResult<RelationalOperator> {
    let common = common_of(&project.estimates().clone(), project.output_cols().to_vec(), env);

    let into = match project.into_target.take() {
        Some(into) => into,
        None => {
            let child = require_child(project.child, "Project")?;
            let child = convert_node(child, env, &surroundings.for_child(true))?;
            return Ok(RelationalOperator::Project {
                common,
                cols: project.cols,
                child: Box::new(child),
            });
        }
    };

    // INSERT…SELECT：来源节点持有原始命令，其子树是 SELECT 计划
    let select_plan = match require_child(project.child, "Project")? {
        RelNode::Source(mut s) => s.child.take().map(|b| *b).ok_or_else(|| {
            PlannerError::InvariantViolation(
                "INTO 目标的来源节点没有查询子树".to_string(),
            )
        })?,
        RelNode::Access(mut a) => match a.child.take().map(|b| *b) {
            Some(RelNode::Source(mut s)) if s.child.is_some() => *s.child.take().unwrap(),
            _ => {
                return Err(PlannerError::InvariantViolation(
                    "INTO 目标的访问节点形态异常".to_string(),
                )
                .into())
            }
        },
        other => {
            return Err(PlannerError::InvariantViolation(format!(
                "INTO 目标之下出现了意外的 {} 节点",
                other.type_name()
            ))
            .into())
        }
    };

    let into_env = Surroundings {
        parent_is_project: false,
        under_into: true,
    };
    let child = convert_node(select_plan, env, &into_env)?;

    // 虚拟目标走专用的插入计划执行算子
    let target_model = env.metadata.model_name(&into.group).unwrap_or(None);
    if into.group.is_virtual() || target_model.is_none() {
        return Ok(RelationalOperator::InsertPlanExecution {
            common,
            target: into.group,
            child: Box::new(child),
        });
    }

    // 执行模式严格按源能力从高到低选择
    let model = target_model.unwrap_or_default();
    let caps = &env.capabilities;
    let mode = if caps.supports(&model, Capability::InsertWithIterator) {
        InsertMode::Iterator
    } else if caps.supports(&model, Capability::BulkInsert) {
        InsertMode::Bulk
    } else if caps.supports(&model, Capability::BatchedInsert) {
        InsertMode::Batched
    } else {
        InsertMode::SingleRow
    };
    log::debug!("INSERT 目标 {} 选择执行模式 {:?}", into.group.name(), mode);

    Ok(RelationalOperator::ProjectInto {
        common,
        target: into.group,
        columns: into.columns,
        mode,
        child: Box::new(child),
    })
}

fn convert_access(
    mut access: AccessNode,
    env: &mut PlanEnv,
    surroundings: &Surroundings,
) -> CompileResult<RelationalOperator> {
    let common = common_of(&access.estimates().clone(), access.output_cols().to_vec(), env);

    // 已独立编译的嵌套命令/过程包装为计划执行算子
    if let Some(plan) = access.nested_plan.take() {
        return Ok(match access.correlated_refs.take() {
            // 依赖连接驱动的调用带着相关引用映射
            Some(refs) => RelationalOperator::DependentProcedure {
                common,
                plan,
                correlated_refs: refs,
            },
            None => RelationalOperator::PlanExecution { common, plan },
        });
    }

    let mut command = access.command.take().ok_or_else(|| {
        PlannerError::InvariantViolation("访问节点没有收拢出下推命令".to_string())
    })?;

    // 每个下推子命令一个别名生成器实例
    let mut aliases = AliasGenerator::new();
    aliases.visit_command(&mut command);

    let output_cols = common.output_cols.clone();
    let operator = RelationalOperator::Access {
        common,
        model: access.model.clone(),
        command,
    };

    // 内部系统目录表的输出列与自然列序不一致时补一层显式投影；
    // 父节点已是投影时交给它完成
    if !surroundings.parent_is_project && !output_cols.is_empty() {
        if let Some(group) = access.groups().first() {
            if env.metadata.is_system_table(group) {
                let natural = env.metadata.elements(group)?;
                let prefix_of_natural = natural
                    .iter()
                    .zip(output_cols.iter())
                    .take_while(|(n, o)| n == o)
                    .count()
                    == output_cols.len();
                if !prefix_of_natural {
                    let cols: Vec<SelectItem> = output_cols
                        .iter()
                        .map(|sym| {
                            SelectItem::new(Expression::Element(sym.clone()), sym.clone())
                        })
                        .collect();
                    let common = OperatorCommon {
                        id: env.ids.next_id(),
                        output_cols,
                        estimates: operator.common().estimates.clone(),
                    };
                    return Ok(RelationalOperator::Project {
                        common,
                        cols,
                        child: Box::new(operator),
                    });
                }
            }
        }
    }

    Ok(operator)
}

fn convert_source(
    mut source: SourceNode,
    env: &mut PlanEnv,
    surroundings: &Surroundings,
) -> CompileResult<RelationalOperator> {
    // 表值函数：按最终输出列裁掉函数自己用不到的列求值
    if let Some(mut function) = source.table_function.take() {
        let needed: Vec<&str> = source
            .output_cols()
            .iter()
            .map(|sym| sym.short_name())
            .collect();
        if !needed.is_empty() {
            function
                .columns
                .retain(|col| needed.iter().any(|n| *n == col.name));
        }
        let common = common_of(&source.estimates().clone(), source.output_cols().to_vec(), env);
        return Ok(RelationalOperator::TableFunctionScan { common, function });
    }

    // 虚拟来源不生成算子：改名传播后直接递归唯一子节点
    if source.symbol_map.is_some() {
        let source_output_cols = source.output_cols().to_vec();
        let mut child = require_child(source.child, "Source")?;
        if !surroundings.under_into {
            if let RelNode::Project(p) = &mut child {
                // 改名不改投影：先保住子投影原有的输出列作为投影列
                let prior = p.output_cols().to_vec();
                if !prior.is_empty() {
                    p.set_cols_from_elements(&prior);
                }
                p.set_output_cols(source_output_cols);
            } else if !source_output_cols.is_empty() {
                child.set_output_cols(source_output_cols);
            }
        }
        return convert_node(child, env, surroundings);
    }

    Err(PlannerError::UnknownNodeType(format!(
        "来源节点 {} 没有被访问放置或收拢",
        source
            .group
            .as_ref()
            .map(|g| g.name())
            .unwrap_or("<anonymous>")
    ))
    .into())
}

fn convert_set_op(
    set_op: crate::query::planner::plan::nodes::SetOpNode,
    env: &mut PlanEnv,
    surroundings: &Surroundings,
) -> CompileResult<RelationalOperator> {
    use crate::query::command::SetOperation;

    let common = common_of(&set_op.estimates().clone(), set_op.output_cols().to_vec(), env);
    let output_cols = common.output_cols.clone();
    let child_env = surroundings.for_child(false);

    match set_op.op {
        SetOperation::Union => {
            let left = convert_node(*set_op.left, env, &child_env)?;
            let right = convert_node(*set_op.right, env, &child_env)?;

            // 嵌套的 UNION ALL 拍平成一个多路算子
            let mut children = Vec::new();
            for op in [left, right] {
                match op {
                    RelationalOperator::UnionAll {
                        children: nested, ..
                    } => children.extend(nested),
                    other => children.push(other),
                }
            }
            let union = RelationalOperator::UnionAll { common, children };

            if set_op.all {
                return Ok(union);
            }
            // 去重的 UNION：联合算子之上套排序去重
            let dedup_common = OperatorCommon {
                id: env.ids.next_id(),
                output_cols: output_cols.clone(),
                estimates: union.common().estimates.clone(),
            };
            Ok(RelationalOperator::Sort {
                common: dedup_common,
                items: sort_on_all(&output_cols),
                mode: SortMode::SortDistinct,
                child: Box::new(union),
            })
        }
        SetOperation::Intersect | SetOperation::Except => {
            // 半连接/反半连接对两侧排序去重后的输入做归并
            let semantics = if set_op.op == SetOperation::Intersect {
                JoinSemantics::Semi
            } else {
                JoinSemantics::AntiSemi
            };
            let left_cols = set_op.left.output_cols().to_vec();
            let right_cols = set_op.right.output_cols().to_vec();

            let left = convert_node(*set_op.left, env, &child_env)?;
            let right = convert_node(*set_op.right, env, &child_env)?;

            let left_sorted = sort_distinct_over(left, &left_cols, env);
            let right_sorted = sort_distinct_over(right, &right_cols, env);

            Ok(RelationalOperator::Join {
                common,
                join_type: JoinType::Inner,
                strategy: JoinStrategyOp::Merge {
                    left_sort: sort_on_all(&left_cols),
                    right_sort: sort_on_all(&right_cols),
                },
                semantics,
                criteria: Vec::new(),
                left: Box::new(left_sorted),
                right: Box::new(right_sorted),
            })
        }
    }
}

fn sort_on_all(cols: &[ElementSymbol]) -> Vec<OrderByItem> {
    cols.iter()
        .map(|sym| OrderByItem {
            expr: Expression::Element(sym.clone()),
            ascending: true,
        })
        .collect()
}

fn sort_distinct_over(
    child: RelationalOperator,
    cols: &[ElementSymbol],
    env: &mut PlanEnv,
) -> RelationalOperator {
    let common = OperatorCommon {
        id: env.ids.next_id(),
        output_cols: cols.to_vec(),
        estimates: child.common().estimates.clone(),
    };
    RelationalOperator::Sort {
        common,
        items: sort_on_all(cols),
        mode: SortMode::SortDistinct,
        child: Box::new(child),
    }
}

fn common_of(
    estimates: &crate::query::planner::plan::nodes::CostEstimates,
    output_cols: Vec<ElementSymbol>,
    env: &mut PlanEnv,
) -> OperatorCommon {
    OperatorCommon {
        id: env.ids.next_id(),
        output_cols,
        estimates: estimates.clone(),
    }
}

fn require_child(child: Option<Box<RelNode>>, parent: &str) -> CompileResult<RelNode> {
    child.map(|b| *b).ok_or_else(|| {
        PlannerError::InvariantViolation(format!("{} 节点没有子树", parent)).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol::{GroupSymbol, SymbolMap};
    use crate::core::value::{DataType, Value};
    use crate::query::command::{
        FromClause, QueryCommand, SelectClause, SetOperation,
    };
    use crate::query::planner::plan::nodes::{
        IntoTarget, SetOpNode, SortNode, TupleLimitNode,
    };
    use crate::query::test_support::env_with_table;

    fn sym(group: &str, name: &str) -> ElementSymbol {
        ElementSymbol::with_group(
            format!("{}.{}", group, name),
            GroupSymbol::new(group),
            DataType::Integer,
        )
    }

    fn int(v: i64) -> Expression {
        Expression::Constant(Value::Integer(v))
    }

    fn pushdown_query(group: &str) -> Command {
        let g = GroupSymbol::new(group);
        let s = sym(group, "e1");
        Command::Query(QueryCommand {
            select: SelectClause {
                distinct: false,
                items: vec![SelectItem::new(Expression::Element(s.clone()), s)],
            },
            from: vec![FromClause::Group(g)],
            ..Default::default()
        })
    }

    fn collapsed_access(group: &str, model: &str) -> AccessNode {
        let mut access = AccessNode::new(Some(model.to_string()), None);
        access.command = Some(pushdown_query(group));
        access.add_group(GroupSymbol::new(group));
        access.set_output_cols(vec![sym(group, "e1")]);
        access
    }

    #[test]
    fn test_limit_over_sort_over_access() {
        let mut env = env_with_table("pm1.g1", "source1", vec![("e1", DataType::Integer)]);

        let access = collapsed_access("pm1.g1", "source1");
        let sort = SortNode::new(
            vec![OrderByItem {
                expr: Expression::Element(sym("pm1.g1", "e1")),
                ascending: true,
            }],
            Some(access.into_node()),
        );
        let limit = TupleLimitNode::new(Some(int(2)), Some(int(5)), Some(sort.into_node()));

        let plan = convert(limit.into_node(), &mut env).unwrap();
        match &plan.root {
            RelationalOperator::Limit { offset, limit, child, .. } => {
                assert_eq!(offset, &Some(int(2)));
                assert_eq!(limit, &Some(int(5)));
                match child.as_ref() {
                    RelationalOperator::Sort { child, mode, .. } => {
                        assert_eq!(*mode, SortMode::Sort);
                        assert!(matches!(
                            child.as_ref(),
                            RelationalOperator::Access { .. }
                        ));
                    }
                    other => panic!("限制之下应当是排序: {:?}", other.type_name()),
                }
            }
            other => panic!("根应当是限制算子: {:?}", other.type_name()),
        }
        assert!(plan.root.ids_unique());
    }

    #[test]
    fn test_rename_propagation_through_virtual_source() {
        let mut env = env_with_table("pm1.g1", "source1", vec![("e1", DataType::Integer)]);

        let x = sym("pm1.g1", "x");
        let y = sym("pm1.g1", "y");
        let a = sym("v1", "a");
        let b = sym("v1", "b");

        let mut project = ProjectNode::new(
            vec![
                SelectItem::new(Expression::Element(x.clone()), x.clone()),
                SelectItem::new(Expression::Element(y.clone()), y.clone()),
            ],
            Some(collapsed_access("pm1.g1", "source1").into_node()),
        );
        project.set_output_cols(vec![x.clone(), y.clone()]);

        let mut map = SymbolMap::new();
        map.insert(Expression::Element(a.clone()), Expression::Element(x.clone()));
        map.insert(Expression::Element(b.clone()), Expression::Element(y.clone()));

        let mut source = SourceNode::for_group(GroupSymbol::virtual_group("v1"));
        source.symbol_map = Some(map);
        source.set_output_cols(vec![a.clone(), b.clone()]);
        source.set_child(project.into_node());

        let plan = convert(source.into_node(), &mut env).unwrap();
        // 来源节点透传，根是改名后的投影算子
        match &plan.root {
            RelationalOperator::Project { common, cols, .. } => {
                // PROJECT_COLS 保住先前的输出 [x, y]
                assert_eq!(cols.len(), 2);
                assert_eq!(cols[0].symbol, x);
                assert_eq!(cols[1].symbol, y);
                // OUTPUT_COLS 换成外层的 [a, b]
                assert_eq!(common.output_cols, vec![a, b]);
            }
            other => panic!("应当透传为投影算子: {:?}", other.type_name()),
        }
    }

    #[test]
    fn test_union_distinct_gets_sort_dedup() {
        let mut env = env_with_table("pm1.g1", "source1", vec![("e1", DataType::Integer)]);

        let mut union = SetOpNode::new(
            SetOperation::Union,
            false,
            collapsed_access("pm1.g1", "source1").into_node(),
            collapsed_access("pm1.g1", "source1").into_node(),
        );
        union.set_output_cols(vec![sym("pm1.g1", "e1")]);

        let plan = convert(union.into_node(), &mut env).unwrap();
        match &plan.root {
            RelationalOperator::Sort { mode, child, .. } => {
                assert_eq!(*mode, SortMode::SortDistinct);
                assert!(matches!(
                    child.as_ref(),
                    RelationalOperator::UnionAll { .. }
                ));
            }
            other => panic!("去重联合应当是排序去重盖联合: {:?}", other.type_name()),
        }
    }

    #[test]
    fn test_union_all_needs_no_dedup() {
        let mut env = env_with_table("pm1.g1", "source1", vec![("e1", DataType::Integer)]);
        let union = SetOpNode::new(
            SetOperation::Union,
            true,
            collapsed_access("pm1.g1", "source1").into_node(),
            collapsed_access("pm1.g1", "source1").into_node(),
        );
        let plan = convert(union.into_node(), &mut env).unwrap();
        assert!(matches!(plan.root, RelationalOperator::UnionAll { .. }));
    }

    #[test]
    fn test_intersect_becomes_semi_merge_join() {
        let mut env = env_with_table("pm1.g1", "source1", vec![("e1", DataType::Integer)]);
        let intersect = SetOpNode::new(
            SetOperation::Intersect,
            false,
            collapsed_access("pm1.g1", "source1").into_node(),
            collapsed_access("pm1.g1", "source1").into_node(),
        );
        let plan = convert(intersect.into_node(), &mut env).unwrap();
        match &plan.root {
            RelationalOperator::Join {
                semantics,
                strategy,
                left,
                right,
                ..
            } => {
                assert_eq!(*semantics, JoinSemantics::Semi);
                assert!(matches!(strategy, JoinStrategyOp::Merge { .. }));
                // 两侧输入都排序去重
                for side in [left.as_ref(), right.as_ref()] {
                    assert!(matches!(
                        side,
                        RelationalOperator::Sort {
                            mode: SortMode::SortDistinct,
                            ..
                        }
                    ));
                }
            }
            other => panic!("INTERSECT 应当是半连接归并: {:?}", other.type_name()),
        }
    }

    #[test]
    fn test_insert_mode_by_capability_order() {
        use crate::query::context::CommandContext;
        use crate::query::metadata::capability::ConfiguredCapabilities;
        use crate::query::metadata::memory::TableDef;
        use crate::query::metadata::InMemoryCatalog;
        use std::sync::Arc;

        let catalog = InMemoryCatalog::new();
        catalog.add_table(TableDef::new(
            "pm1.target",
            "sink1",
            vec![("e1", DataType::Integer)],
        ));
        catalog.add_table(TableDef::new(
            "pm1.src",
            "source1",
            vec![("e1", DataType::Integer)],
        ));
        let mut caps = ConfiguredCapabilities::new();
        // 只开放批量插入：迭代模式不可用时落到 Bulk
        caps.grant("sink1", Capability::BulkInsert);
        let mut env = crate::query::PlanEnv::new(
            Arc::new(catalog),
            Arc::new(caps),
            CommandContext::default(),
            crate::config::PlannerConfig::default(),
        );

        let target = GroupSymbol::new("pm1.target");
        let insert = Command::Insert(crate::query::command::InsertCommand {
            group: target.clone(),
            columns: vec![sym("pm1.target", "e1")],
            values: None,
            query: Some(Box::new(pushdown_query("pm1.src"))),
            constraint: None,
        });
        let mut inner = SourceNode::for_command(insert);
        inner.group = Some(target.clone());
        inner.set_child(collapsed_access("pm1.src", "source1").into_node());

        let project = ProjectNode::new(
            vec![SelectItem::new(
                Expression::Element(sym("pm1", "rows_updated")),
                sym("pm1", "rows_updated"),
            )],
            Some(inner.into_node()),
        )
        .with_into(IntoTarget {
            group: target,
            columns: vec![sym("pm1.target", "e1")],
        });

        let plan = convert(project.into_node(), &mut env).unwrap();
        match &plan.root {
            RelationalOperator::ProjectInto { mode, child, .. } => {
                assert_eq!(*mode, InsertMode::Bulk);
                assert!(matches!(child.as_ref(), RelationalOperator::Access { .. }));
            }
            other => panic!("应当是写入投影算子: {:?}", other.type_name()),
        }
    }

    #[test]
    fn test_nested_plan_access_becomes_plan_execution() {
        let mut env = env_with_table("pm1.g1", "source1", vec![("e1", DataType::Integer)]);

        let subplan = {
            let access = collapsed_access("pm1.g1", "source1");
            convert(access.into_node(), &mut env).unwrap()
        };
        let access = AccessNode::for_subplan(subplan);
        let plan = convert(access.into_node(), &mut env).unwrap();
        assert!(matches!(
            plan.root,
            RelationalOperator::PlanExecution { .. }
        ));
        assert!(plan.root.ids_unique());
    }

    #[test]
    fn test_uncollapsed_access_is_fatal() {
        let mut env = env_with_table("pm1.g1", "source1", vec![("e1", DataType::Integer)]);
        let access = AccessNode::new(Some("source1".to_string()), None);
        assert!(convert(access.into_node(), &mut env).is_err());
    }

    #[test]
    fn test_access_command_gets_aliased() {
        let mut env = env_with_table("pm1.g1", "source1", vec![("e1", DataType::Integer)]);
        let plan = convert(collapsed_access("pm1.g1", "source1").into_node(), &mut env).unwrap();
        match &plan.root {
            RelationalOperator::Access { command, .. } => match command {
                Command::Query(q) => {
                    if let FromClause::Group(g) = &q.from[0] {
                        assert_eq!(g.output_name(), "g_0");
                    } else {
                        panic!("应当是表引用");
                    }
                }
                other => panic!("应当是查询命令: {:?}", other),
            },
            other => panic!("应当是访问算子: {:?}", other.type_name()),
        }
    }

    #[test]
    fn test_system_table_gets_correction_projection() {
        use crate::query::context::CommandContext;
        use crate::query::metadata::capability::AllCapabilities;
        use crate::query::metadata::memory::TableDef;
        use crate::query::metadata::InMemoryCatalog;
        use std::sync::Arc;

        let catalog = InMemoryCatalog::new();
        catalog.add_table(
            TableDef::new(
                "sys.tables",
                "system",
                vec![("name", DataType::String), ("schema", DataType::String)],
            )
            .as_system_table(),
        );
        let mut env = crate::query::PlanEnv::new(
            Arc::new(catalog),
            Arc::new(AllCapabilities),
            CommandContext::default(),
            crate::config::PlannerConfig::default(),
        );

        // 要求的输出列顺序与自然列序相反
        let g = GroupSymbol::new("sys.tables");
        let schema_col =
            ElementSymbol::with_group("sys.tables.schema", g.clone(), DataType::String);
        let name_col = ElementSymbol::with_group("sys.tables.name", g.clone(), DataType::String);
        let mut access = AccessNode::new(Some("system".to_string()), None);
        access.command = Some(pushdown_query("sys.tables"));
        access.add_group(g);
        access.set_output_cols(vec![schema_col, name_col]);

        let plan = convert(access.into_node(), &mut env).unwrap();
        match &plan.root {
            RelationalOperator::Project { child, .. } => {
                assert!(matches!(child.as_ref(), RelationalOperator::Access { .. }));
            }
            other => panic!("系统表应当套上校正投影: {:?}", other.type_name()),
        }
    }
}
