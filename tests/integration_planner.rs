//! 关系规划器集成测试
//!
//! 测试范围:
//! - 规范计划树的结构不变量（单根、连接两子、子句堆叠顺序）
//! - 多表 FROM 并为左深 CROSS 连接
//! - 视图内联与物化重定向
//! - 变更命令的 PROJECT-over-SOURCE 包装
//! - 特征提示计算与依赖提示分发

mod common;

use common::assertions::{assert_count, assert_err_with, assert_ok};
use common::{
    col, col_expr, command, filtered_query, full_env, group, int, select_query, string,
};

use fedsql::core::expression::Expression;
use fedsql::query::command::{
    Command, FromClause, JoinType, SetOperation, SetQueryCommand, UpdateCommand,
};
use fedsql::query::planner::plan::{NodeMask, RelNode};
use fedsql::query::planner::RelationalPlanner;

// ==================== 规范树结构 ====================

#[test]
fn test_canonical_tree_clause_stacking_order() {
    let mut env = full_env();
    let q = common::with_order_and_limit(
        filtered_query(
            "pm1.g1",
            &["e1"],
            Expression::and(
                Expression::eq(col_expr("pm1.g1", "e1"), int(1)),
                Expression::eq(col_expr("pm1.g1", "e2"), string("a")),
            ),
        ),
        col("pm1.g1", "e1"),
        2,
        5,
    );

    let planned = assert_ok(RelationalPlanner::new(&mut env).plan(command(q)));

    // 自顶向下：TUPLE_LIMIT → SORT → PROJECT → SELECT → SELECT → SOURCE
    let mut names = Vec::new();
    let mut node = Some(&planned.root);
    while let Some(n) = node {
        names.push(n.type_name());
        node = n.children().into_iter().next();
    }
    assert_eq!(
        names,
        vec!["TupleLimit", "Sort", "Project", "Select", "Select", "Source"]
    );
    assert!(planned.hints.has_criteria);
    assert!(planned.hints.has_limit);
    assert!(!planned.hints.has_join);
}

#[test]
fn test_join_nodes_have_two_ordered_children() {
    let mut env = full_env();
    let mut q = select_query("pm1.g1", &["e1"]);
    q.from = vec![FromClause::Join {
        left: Box::new(FromClause::Group(group("pm1.g1"))),
        right: Box::new(FromClause::Group(group("pm1.g2"))),
        join_type: JoinType::Inner,
        criteria: vec![Expression::eq(
            col_expr("pm1.g1", "e1"),
            col_expr("pm1.g2", "e1"),
        )],
        optional: false,
    }];

    let planned = assert_ok(RelationalPlanner::new(&mut env).plan(command(q)));
    let joins = planned.root.find_nodes(NodeMask::JOIN);
    assert_count(&joins, 1, "连接节点");

    let children = joins[0].children();
    assert_count(&children, 2, "连接子节点");
    // 左右顺序与子句顺序一致
    assert_eq!(children[0].group_names(), vec!["pm1.g1".to_string()]);
    assert_eq!(children[1].group_names(), vec!["pm1.g2".to_string()]);
    assert!(planned.hints.has_join);
}

#[test]
fn test_multi_item_from_merged_left_deep() {
    let mut env = full_env();
    let mut q = select_query("pm1.g1", &["e1"]);
    q.from = vec![
        FromClause::Group(group("pm1.g1")),
        FromClause::Group(group("pm1.g2")),
        FromClause::Group(group("pm2.g1")),
    ];

    let planned = assert_ok(RelationalPlanner::new(&mut env).plan(command(q)));
    let joins = planned.root.find_nodes(NodeMask::JOIN);
    assert_count(&joins, 2, "连接节点");

    // 根部连接的左侧还是连接，右侧是最后列出的表
    if let RelNode::Join(outer) = joins[0] {
        assert_eq!(outer.join_type, JoinType::Cross);
        assert!(matches!(outer.left.as_ref(), RelNode::Join(_)));
        assert_eq!(outer.right.group_names(), vec!["pm2.g1".to_string()]);
    } else {
        panic!("应当是连接节点");
    }
}

#[test]
fn test_set_query_children_match_branch_order() {
    let mut env = full_env();
    let sq = Command::SetQuery(SetQueryCommand {
        op: SetOperation::Union,
        all: true,
        left: Box::new(command(filtered_query(
            "pm1.g1",
            &["e1"],
            Expression::eq(col_expr("pm1.g1", "e1"), int(1)),
        ))),
        right: Box::new(command(filtered_query(
            "pm1.g1",
            &["e1"],
            Expression::eq(col_expr("pm1.g1", "e1"), int(2)),
        ))),
        order_by: vec![],
        limit: None,
        with: vec![],
    });

    let planned = assert_ok(RelationalPlanner::new(&mut env).plan(sq));
    let set_ops = planned.root.find_nodes(NodeMask::SET_OP);
    assert_count(&set_ops, 1, "集合运算节点");
    assert_count(&set_ops[0].children(), 2, "集合运算子节点");
    assert!(planned.hints.has_set_query);

    // 不相交的常量域产出分区提示
    if let RelNode::SetOp(s) = set_ops[0] {
        let partition = s.partition_info.as_ref().expect("应有分区提示");
        assert_eq!(partition.len(), 1);
    }
}

#[test]
fn test_node_ids_unique_across_tree() {
    let mut env = full_env();
    let q = filtered_query(
        "pm1.g1",
        &["e1", "e2"],
        Expression::eq(col_expr("pm1.g1", "e1"), int(1)),
    );
    let planned = assert_ok(RelationalPlanner::new(&mut env).plan(command(q)));

    let mut seen = std::collections::HashSet::new();
    let mut stack = vec![&planned.root];
    while let Some(node) = stack.pop() {
        assert!(seen.insert(node.id()), "节点 ID {} 重复", node.id());
        stack.extend(node.children());
    }
}

// ==================== 视图处理 ====================

#[test]
fn test_view_inlined_with_symbol_map() {
    let catalog = common::sample_catalog();
    catalog.add_view("pm1.v1", command(select_query("pm1.g1", &["e1"])));
    let mut env = common::env_with_catalog(catalog);

    let planned = assert_ok(
        RelationalPlanner::new(&mut env).plan(command(select_query("pm1.v1", &["e1"]))),
    );
    assert!(planned.hints.has_virtual_groups);

    let sources = planned.root.find_nodes(NodeMask::SOURCE);
    let virtual_source = sources
        .iter()
        .find_map(|s| match s {
            RelNode::Source(src) if src.is_virtual() => Some(src),
            _ => None,
        })
        .expect("应有虚拟来源节点");
    assert_eq!(virtual_source.symbol_map.as_ref().unwrap().len(), 1);
    assert!(virtual_source.child.is_some());
}

#[test]
fn test_materialized_view_redirected() {
    let catalog = common::sample_catalog();
    catalog.add_table(
        fedsql::query::metadata::memory::TableDef::new(
            "pm1.mat_v2",
            "source1",
            vec![("e1", fedsql::core::value::DataType::Integer)],
        )
        .with_cardinality(1000.0),
    );
    catalog.add_materialized_view(
        "pm1.v2",
        command(select_query("pm1.g1", &["e1"])),
        group("pm1.mat_v2"),
        true,
    );
    let mut env = common::env_with_catalog(catalog);

    let planned = assert_ok(
        RelationalPlanner::new(&mut env).plan(command(select_query("pm1.v2", &["e1"]))),
    );

    // 重定向后树里引用的是物化表，不再是原始基表
    let groups: Vec<String> = planned
        .root
        .find_nodes(NodeMask::SOURCE)
        .iter()
        .flat_map(|s| s.group_names())
        .collect();
    assert!(groups.iter().any(|g| g == "pm1.mat_v2"));
    assert!(!groups.iter().any(|g| g == "pm1.g1"));

    let annotations = env.sink.annotations();
    assert!(annotations
        .iter()
        .any(|a| a.category == "materialized-view" && a.message.contains("重定向")));
}

#[test]
fn test_nocache_bypasses_materialization() {
    let catalog = common::sample_catalog();
    catalog.add_table(
        fedsql::query::metadata::memory::TableDef::new(
            "pm1.mat_v2",
            "source1",
            vec![("e1", fedsql::core::value::DataType::Integer)],
        ),
    );
    catalog.add_materialized_view(
        "pm1.v2",
        command(select_query("pm1.g1", &["e1"])),
        group("pm1.mat_v2"),
        true,
    );
    let mut env = common::env_with_catalog(catalog);

    let mut q = select_query("pm1.v2", &["e1"]);
    q.option.no_cache = true;
    let planned = assert_ok(RelationalPlanner::new(&mut env).plan(command(q)));

    // 绕过物化，基表引用保留
    let groups: Vec<String> = planned
        .root
        .find_nodes(NodeMask::SOURCE)
        .iter()
        .flat_map(|s| s.group_names())
        .collect();
    assert!(groups.iter().any(|g| g == "pm1.g1"));

    let annotations = env.sink.annotations();
    assert!(annotations
        .iter()
        .any(|a| a.category == "materialized-view" && a.message.contains("绕过")));
}

// ==================== 变更命令 ====================

#[test]
fn test_update_wrapped_in_project_over_source() {
    let mut env = full_env();
    let update = Command::Update(UpdateCommand {
        group: group("pm1.g1"),
        changes: vec![(col("pm1.g1", "e2"), string("x"))],
        criteria: Some(Expression::eq(col_expr("pm1.g1", "e1"), int(1))),
        constraint: None,
    });

    let planned = assert_ok(RelationalPlanner::new(&mut env).plan(update));
    match &planned.root {
        RelNode::Project(p) => {
            assert_eq!(p.output_cols()[0].short_name(), "rows_updated");
            match p.child.as_deref() {
                Some(RelNode::Source(s)) => {
                    assert!(matches!(s.command, Some(Command::Update(_))));
                }
                other => panic!("投影之下应当是来源节点: {:?}", other.map(|n| n.type_name())),
            }
        }
        other => panic!("变更命令应当包成投影: {}", other.type_name()),
    }
}

// ==================== 提示分发 ====================

#[test]
fn test_unmatched_dependent_hint_is_advisory() {
    let mut env = full_env();
    let mut q = select_query("pm1.g1", &["e1"]);
    q.option.dependent_groups = vec!["no.such_table".to_string()];

    assert_ok(RelationalPlanner::new(&mut env).plan(command(q)));

    // 未匹配的提示只是注记，从不报错
    let annotations = env.sink.annotations();
    assert!(annotations
        .iter()
        .any(|a| a.category == "dependent-hint" && a.message.contains("no.such_table")));
}

#[test]
fn test_dependent_hint_matched_by_partial_name() {
    let mut env = full_env();
    let mut q = select_query("pm1.g2", &["e1"]);
    // 部分名 g2 经元数据点分后缀查找命中 pm1.g2
    q.option.dependent_groups = vec!["g2".to_string()];

    let planned = assert_ok(RelationalPlanner::new(&mut env).plan(command(q)));
    let stamped = planned.root.find_nodes(NodeMask::SOURCE).iter().any(|s| {
        matches!(s, RelNode::Source(src) if src.dependent_hint == Some(true))
    });
    assert!(stamped, "部分名提示应当命中来源节点");
}

// ==================== 错误处理 ====================

#[test]
fn test_unknown_group_is_metadata_error() {
    let mut env = full_env();
    let q = select_query("pm9.missing", &["e1"]);
    assert_err_with(
        RelationalPlanner::new(&mut env).plan(command(q)),
        "找不到组",
    );
}
