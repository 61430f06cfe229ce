//! 集成测试共享工具模块
//!
//! 提供测试目录、能力配置与命令构造辅助，供所有集成测试使用

#![allow(dead_code)]

pub mod assertions;

use std::sync::Arc;

use fedsql::config::PlannerConfig;
use fedsql::core::expression::Expression;
use fedsql::core::symbol::{ElementSymbol, GroupSymbol};
use fedsql::core::value::{DataType, Value};
use fedsql::query::command::{
    Command, FromClause, LimitClause, OrderByItem, QueryCommand, SelectClause, SelectItem,
};
use fedsql::query::context::CommandContext;
use fedsql::query::metadata::capability::{AllCapabilities, ConfiguredCapabilities};
use fedsql::query::metadata::memory::TableDef;
use fedsql::query::metadata::{Capability, InMemoryCatalog, PolicySet};
use fedsql::query::PlanEnv;

/// 标准测试目录：两个模型、四张表
///
/// - `pm1.g1` (source1): e1 int 主键, e2 string, e3 int, 1000 行
/// - `pm1.g2` (source1): e1 int 主键, e2 string, 100 行
/// - `pm2.g1` (source2): e1 int, e2 string, 5 行
/// - `sys.tables` (system): 系统目录表
pub fn sample_catalog() -> InMemoryCatalog {
    let catalog = InMemoryCatalog::new();
    catalog.add_table(
        TableDef::new(
            "pm1.g1",
            "source1",
            vec![
                ("e1", DataType::Integer),
                ("e2", DataType::String),
                ("e3", DataType::Integer),
            ],
        )
        .with_primary_key(vec!["e1"])
        .with_cardinality(1000.0),
    );
    catalog.add_table(
        TableDef::new(
            "pm1.g2",
            "source1",
            vec![("e1", DataType::Integer), ("e2", DataType::String)],
        )
        .with_primary_key(vec!["e1"])
        .with_cardinality(100.0),
    );
    catalog.add_table(
        TableDef::new(
            "pm2.g1",
            "source2",
            vec![("e1", DataType::Integer), ("e2", DataType::String)],
        )
        .with_primary_key(vec!["e1"])
        .with_cardinality(5.0),
    );
    catalog.add_table(
        TableDef::new(
            "sys.tables",
            "system",
            vec![("name", DataType::String), ("schema", DataType::String)],
        )
        .as_system_table(),
    );
    catalog
}

/// 全能力环境：一切操作都可下推
pub fn full_env() -> PlanEnv {
    PlanEnv::new(
        Arc::new(sample_catalog()),
        Arc::new(AllCapabilities),
        CommandContext::default(),
        PlannerConfig::default(),
    )
}

/// 只授予指定能力的受限环境（source1 与 source2 同配）
pub fn restricted_env(granted: &[Capability]) -> PlanEnv {
    let mut caps = ConfiguredCapabilities::new();
    caps.grant_all("source1", granted);
    caps.grant_all("source2", granted);
    PlanEnv::new(
        Arc::new(sample_catalog()),
        Arc::new(caps),
        CommandContext::default(),
        PlannerConfig::default(),
    )
}

/// 带安全策略集的全能力环境
pub fn secured_env(policies: PolicySet) -> PlanEnv {
    PlanEnv::new(
        Arc::new(sample_catalog()),
        Arc::new(AllCapabilities),
        CommandContext::new(policies),
        PlannerConfig::default(),
    )
}

/// 自定义目录的全能力环境
pub fn env_with_catalog(catalog: InMemoryCatalog) -> PlanEnv {
    PlanEnv::new(
        Arc::new(catalog),
        Arc::new(AllCapabilities),
        CommandContext::default(),
        PlannerConfig::default(),
    )
}

// ==================== 符号与表达式构造 ====================

pub fn group(name: &str) -> GroupSymbol {
    GroupSymbol::new(name)
}

pub fn col(table: &str, name: &str) -> ElementSymbol {
    let data_type = match name {
        "e2" | "name" | "schema" => DataType::String,
        _ => DataType::Integer,
    };
    ElementSymbol::with_group(
        format!("{}.{}", table, name),
        GroupSymbol::new(table),
        data_type,
    )
}

pub fn col_expr(table: &str, name: &str) -> Expression {
    Expression::Element(col(table, name))
}

pub fn int(v: i64) -> Expression {
    Expression::Constant(Value::Integer(v))
}

pub fn string(v: &str) -> Expression {
    Expression::Constant(Value::String(v.to_string()))
}

// ==================== 命令构造 ====================

/// SELECT <cols> FROM <table>
pub fn select_query(table: &str, cols: &[&str]) -> QueryCommand {
    QueryCommand {
        select: SelectClause {
            distinct: false,
            items: cols
                .iter()
                .map(|c| {
                    let sym = col(table, c);
                    SelectItem::new(Expression::Element(sym.clone()), sym)
                })
                .collect(),
        },
        from: vec![FromClause::Group(group(table))],
        ..Default::default()
    }
}

/// SELECT <cols> FROM <table> WHERE <criteria>
pub fn filtered_query(table: &str, cols: &[&str], criteria: Expression) -> QueryCommand {
    let mut q = select_query(table, cols);
    q.criteria = Some(criteria);
    q
}

/// 给查询套上 ORDER BY 与 LIMIT/OFFSET
pub fn with_order_and_limit(
    mut q: QueryCommand,
    order_col: ElementSymbol,
    offset: i64,
    limit: i64,
) -> QueryCommand {
    q.order_by = vec![OrderByItem {
        expr: Expression::Element(order_col),
        ascending: true,
    }];
    q.limit = Some(LimitClause {
        offset: Some(int(offset)),
        limit: Some(int(limit)),
    });
    q
}

pub fn command(q: QueryCommand) -> Command {
    Command::Query(q)
}
