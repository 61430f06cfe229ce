//! 已解析的命令树
//!
//! 规划器的输入：解析与名称/类型绑定完成之后的命令结构。
//! 本模块只承载数据，不包含任何解析逻辑（解析属于外部协作者）。

use crate::core::expression::Expression;
use crate::core::symbol::{ElementSymbol, GroupSymbol};
use crate::core::value::DataType;

/// 顶层命令
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Query(QueryCommand),
    SetQuery(SetQueryCommand),
    Insert(InsertCommand),
    Update(UpdateCommand),
    Delete(DeleteCommand),
    StoredProcedure(ProcedureCommand),
    Create(CreateCommand),
    Drop(DropCommand),
}

impl Command {
    /// 命令是否为查询类（SELECT / 集合查询）
    pub fn is_query(&self) -> bool {
        matches!(self, Command::Query(_) | Command::SetQuery(_))
    }

    /// 投影列符号（查询类命令）
    pub fn projected_symbols(&self) -> Vec<ElementSymbol> {
        match self {
            Command::Query(q) => q
                .select
                .items
                .iter()
                .map(|item| item.symbol.clone())
                .collect(),
            Command::SetQuery(sq) => sq.left.projected_symbols(),
            _ => Vec::new(),
        }
    }
}

/// SELECT 查询
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryCommand {
    pub with: Vec<WithItem>,
    pub select: SelectClause,
    pub from: Vec<FromClause>,
    pub criteria: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<LimitClause>,
    pub option: CommandOptions,
    /// XML 生成查询不可合并进外层计划
    pub is_xml: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectClause {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
}

/// 单个投影项：表达式 + 解析期分配的输出符号
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expression,
    pub symbol: ElementSymbol,
}

impl SelectItem {
    pub fn new(expr: Expression, symbol: ElementSymbol) -> Self {
        Self { expr, symbol }
    }
}

/// FROM 子句项
#[derive(Debug, Clone, PartialEq)]
pub enum FromClause {
    /// 直接的表/视图引用
    Group(GroupSymbol),
    /// 连接
    Join {
        left: Box<FromClause>,
        right: Box<FromClause>,
        join_type: JoinType,
        criteria: Vec<Expression>,
        /// 显式 optional 提示：无引用时整棵连接子树可被裁剪
        optional: bool,
    },
    /// FROM 子查询（内联视图）
    Subquery {
        command: Box<Command>,
        name: GroupSymbol,
    },
    /// 表值函数（XMLTABLE / TEXTTABLE / ARRAYTABLE）
    TableFunction {
        function: TableFunction,
        name: GroupSymbol,
    },
}

impl FromClause {
    /// 该子句引入的全部组符号
    pub fn groups(&self) -> Vec<GroupSymbol> {
        match self {
            FromClause::Group(g) => vec![g.clone()],
            FromClause::Join { left, right, .. } => {
                let mut out = left.groups();
                out.extend(right.groups());
                out
            }
            FromClause::Subquery { name, .. } => vec![name.clone()],
            FromClause::TableFunction { name, .. } => vec![name.clone()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
}

/// 表值函数定义
#[derive(Debug, Clone, PartialEq)]
pub struct TableFunction {
    pub kind: TableFunctionKind,
    /// 文档/文本/数组来源表达式
    pub source: Expression,
    pub columns: Vec<TableFunctionColumn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFunctionKind {
    Xml,
    Text,
    Array,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableFunctionColumn {
    pub name: String,
    pub data_type: DataType,
    /// XML 的文档路径或文本列的位置描述
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expression,
    pub ascending: bool,
}

/// 行数限制；执行顺序为先 offset 后 limit
#[derive(Debug, Clone, PartialEq)]
pub struct LimitClause {
    pub offset: Option<Expression>,
    pub limit: Option<Expression>,
}

/// WITH 公共表表达式成员
#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub name: GroupSymbol,
    pub columns: Vec<ElementSymbol>,
    pub command: Box<Command>,
}

/// 命令级选项与提示
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandOptions {
    /// MAKE DEP 提示的组名
    pub dependent_groups: Vec<String>,
    /// MAKE NOT DEP 提示的组名
    pub not_dependent_groups: Vec<String>,
    /// 绕过物化表
    pub no_cache: bool,
}

/// 集合查询（UNION / INTERSECT / EXCEPT）
#[derive(Debug, Clone, PartialEq)]
pub struct SetQueryCommand {
    pub op: SetOperation,
    pub all: bool,
    pub left: Box<Command>,
    pub right: Box<Command>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<LimitClause>,
    pub with: Vec<WithItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperation {
    Union,
    Intersect,
    Except,
}

impl SetQueryCommand {
    /// 展平左深 UNION ALL 链为分支列表；遇到其它形态返回 None
    pub fn flatten_union_all(&self) -> Option<Vec<&QueryCommand>> {
        if self.op != SetOperation::Union
            || !self.all
            || !self.order_by.is_empty()
            || self.limit.is_some()
            || !self.with.is_empty()
        {
            return None;
        }
        let mut branches = Vec::new();
        collect_union_branches(&self.left, &mut branches)?;
        collect_union_branches(&self.right, &mut branches)?;
        Some(branches)
    }
}

fn collect_union_branches<'a>(
    command: &'a Command,
    branches: &mut Vec<&'a QueryCommand>,
) -> Option<()> {
    match command {
        Command::Query(q) => {
            if !q.order_by.is_empty() || q.limit.is_some() || !q.with.is_empty() {
                return None;
            }
            branches.push(q);
            Some(())
        }
        Command::SetQuery(sq) => {
            if sq.op != SetOperation::Union
                || !sq.all
                || !sq.order_by.is_empty()
                || sq.limit.is_some()
                || !sq.with.is_empty()
            {
                return None;
            }
            collect_union_branches(&sq.left, branches)?;
            collect_union_branches(&sq.right, branches)
        }
        _ => None,
    }
}

/// INSERT；`query` 存在时为 INSERT…SELECT
#[derive(Debug, Clone, PartialEq)]
pub struct InsertCommand {
    pub group: GroupSymbol,
    pub columns: Vec<ElementSymbol>,
    pub values: Option<Vec<Expression>>,
    pub query: Option<Box<Command>>,
    /// 行级安全过滤器的运行期约束（更新补偿附加）
    pub constraint: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCommand {
    pub group: GroupSymbol,
    pub changes: Vec<(ElementSymbol, Expression)>,
    pub criteria: Option<Expression>,
    pub constraint: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteCommand {
    pub group: GroupSymbol,
    pub criteria: Option<Expression>,
}

/// 存储过程调用
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureCommand {
    pub group: GroupSymbol,
    pub params: Vec<(String, Expression)>,
    pub result_columns: Vec<ElementSymbol>,
}

/// 临时表创建
#[derive(Debug, Clone, PartialEq)]
pub struct CreateCommand {
    pub group: GroupSymbol,
    pub columns: Vec<ElementSymbol>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropCommand {
    pub group: GroupSymbol,
}
