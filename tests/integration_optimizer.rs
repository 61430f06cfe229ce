//! 规则引擎集成测试
//!
//! 测试范围:
//! - 提示驱动的规则序列与整体下推
//! - 能力受限时的引擎侧回退
//! - 条件经虚拟层穿透下推
//! - 可选连接裁剪与执行次数上限

mod common;

use common::assertions::{assert_err_with, assert_ok};
use common::{col_expr, command, filtered_query, full_env, group, int, select_query};

use fedsql::config::PlannerConfig;
use fedsql::core::expression::Expression;
use fedsql::query::command::{Command, FromClause, JoinType};
use fedsql::query::context::CommandContext;
use fedsql::query::process::RelationalOperator;
use fedsql::query::{compile, PlanEnv};
use std::sync::Arc;

// ==================== 整体下推 ====================

#[test]
fn test_filtered_query_collapses_to_single_access() {
    let mut env = full_env();
    let q = filtered_query(
        "pm1.g1",
        &["e1"],
        Expression::eq(col_expr("pm1.g1", "e1"), int(1)),
    );

    let plan = assert_ok(compile(command(q), &mut env));
    match &plan.root {
        RelationalOperator::Access { command, model, .. } => {
            assert_eq!(model.as_deref(), Some("source1"));
            match command {
                Command::Query(q) => {
                    assert!(q.criteria.is_some(), "条件应当进入下推命令");
                    assert_eq!(q.select.items.len(), 1);
                }
                other => panic!("应当收拢为查询命令: {:?}", other),
            }
        }
        other => panic!("全能力下应当整树下推: {}", other.type_name()),
    }
    assert_eq!(plan.root.count_operators(), 1);
}

#[test]
fn test_same_model_join_pushed_as_one_command() {
    let mut env = full_env();
    let mut q = select_query("pm1.g1", &["e1"]);
    q.from = vec![
        FromClause::Group(group("pm1.g1")),
        FromClause::Group(group("pm1.g2")),
    ];
    q.criteria = Some(Expression::eq(
        col_expr("pm1.g1", "e1"),
        col_expr("pm1.g2", "e1"),
    ));

    let plan = assert_ok(compile(command(q), &mut env));
    // 同模型的两表合流进一个访问算子
    assert_eq!(plan.root.count_operators(), 1);
    assert!(matches!(plan.root, RelationalOperator::Access { .. }));
}

#[test]
fn test_cross_model_join_stays_engine_side() {
    let mut env = full_env();
    let mut q = select_query("pm1.g1", &["e1"]);
    q.from = vec![
        FromClause::Group(group("pm1.g1")),
        FromClause::Group(group("pm2.g1")),
    ];
    q.criteria = Some(Expression::eq(
        col_expr("pm1.g1", "e1"),
        col_expr("pm2.g1", "e1"),
    ));

    let plan = assert_ok(compile(command(q), &mut env));
    // 跨模型无法合流，连接留在引擎侧，两个访问各自下推
    let mut access_count = 0;
    let mut join_seen = false;
    let mut stack = vec![&plan.root];
    while let Some(op) = stack.pop() {
        match op {
            RelationalOperator::Access { .. } => access_count += 1,
            RelationalOperator::Join { .. } => join_seen = true,
            _ => {}
        }
        stack.extend(op.children());
    }
    assert_eq!(access_count, 2);
    assert!(join_seen);
}

// ==================== 能力回退 ====================

#[test]
fn test_unsupported_criteria_evaluated_in_engine() {
    // 源只支持裸表扫描，条件留在引擎侧的选择算子里
    let mut env = common::restricted_env(&[]);
    let q = filtered_query(
        "pm1.g1",
        &["e1"],
        Expression::eq(col_expr("pm1.g1", "e1"), int(1)),
    );

    let plan = assert_ok(compile(command(q), &mut env));
    // 投影与选择都留在引擎侧，访问只做裸表扫描
    match &plan.root {
        RelationalOperator::Project { child, .. } => match child.as_ref() {
            RelationalOperator::Select { child, .. } => {
                assert!(matches!(child.as_ref(), RelationalOperator::Access { .. }));
            }
            other => panic!("投影之下应当是选择: {}", other.type_name()),
        },
        other => panic!("条件应当留在引擎侧: {}", other.type_name()),
    }
}

// ==================== 虚拟层穿透 ====================

#[test]
fn test_criteria_pushed_through_inlined_view() {
    let catalog = common::sample_catalog();
    catalog.add_view("pm1.v1", command(select_query("pm1.g1", &["e1"])));
    let mut env = common::env_with_catalog(catalog);

    let q = filtered_query(
        "pm1.v1",
        &["e1"],
        Expression::eq(col_expr("pm1.v1", "e1"), int(3)),
    );
    let plan = assert_ok(compile(command(q), &mut env));

    // 条件经符号映射改写到基表列并进入下推命令
    let mut found = false;
    let mut stack = vec![&plan.root];
    while let Some(op) = stack.pop() {
        if let RelationalOperator::Access { command, .. } = op {
            if let Command::Query(q) = command {
                let criteria = q.criteria.as_ref().expect("条件应当下推");
                assert!(
                    criteria.to_string().contains("pm1.g1.e1"),
                    "条件应当改写到基表列: {}",
                    criteria
                );
                found = true;
            }
        }
        stack.extend(op.children());
    }
    assert!(found, "应当存在携带下推命令的访问算子");
}

// ==================== 可选连接 ====================

#[test]
fn test_unreferenced_optional_join_pruned() {
    let mut env = full_env();
    let mut q = select_query("pm1.g1", &["e1"]);
    q.from = vec![FromClause::Join {
        left: Box::new(FromClause::Group(group("pm1.g1"))),
        right: Box::new(FromClause::Group(group("pm1.g2"))),
        join_type: JoinType::LeftOuter,
        criteria: vec![Expression::eq(
            col_expr("pm1.g1", "e1"),
            col_expr("pm1.g2", "e1"),
        )],
        optional: true,
    }];

    let plan = assert_ok(compile(command(q), &mut env));
    // 右侧无引用，整个连接裁掉，命令只剩单表
    match &plan.root {
        RelationalOperator::Access { command, .. } => match command {
            Command::Query(q) => {
                assert!(matches!(&q.from[0], FromClause::Group(g) if g.name() == "pm1.g1"));
            }
            other => panic!("应当收拢为查询命令: {:?}", other),
        },
        other => panic!("应当整树下推: {}", other.type_name()),
    }
}

// ==================== 确定性与上限 ====================

#[test]
fn test_compilation_is_deterministic() {
    let build = || {
        let mut env = full_env();
        let mut q = select_query("pm1.g1", &["e1", "e2"]);
        q.from = vec![
            FromClause::Group(group("pm1.g1")),
            FromClause::Group(group("pm1.g2")),
        ];
        q.criteria = Some(Expression::and(
            Expression::eq(col_expr("pm1.g1", "e1"), col_expr("pm1.g2", "e1")),
            Expression::eq(col_expr("pm1.g1", "e3"), int(7)),
        ));
        assert_ok(compile(command(q), &mut env))
    };

    let first = build();
    let second = build();
    assert_eq!(format!("{:?}", first.root), format!("{:?}", second.root));
}

#[test]
fn test_rule_ceiling_aborts_compilation() {
    let config = PlannerConfig {
        max_rule_executions: 0,
        ..Default::default()
    };
    let mut env = PlanEnv::new(
        Arc::new(common::sample_catalog()),
        Arc::new(fedsql::query::metadata::capability::AllCapabilities),
        CommandContext::default(),
        config,
    );

    assert_err_with(
        compile(command(select_query("pm1.g1", &["e1"])), &mut env),
        "规则执行次数超过上限",
    );
}
