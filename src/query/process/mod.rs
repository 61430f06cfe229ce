//! 可执行算子树
//!
//! 转换器的产物：运行时消费的具体算子树。与计划树互不共享
//! 节点，转换完成后计划树整体丢弃。

pub mod converter;

use crate::core::expression::Expression;
use crate::core::symbol::{ElementSymbol, GroupSymbol, SymbolMap};
use crate::query::command::{Command, JoinType, OrderByItem, SelectItem, TableFunction, WithItem};
use crate::query::planner::plan::nodes::CostEstimates;

pub use converter::convert;

/// 完整的可执行计划：根算子 + 最终输出列 + 可选的下推 WITH 列表
#[derive(Debug, Clone)]
pub struct ProcessorPlan {
    pub root: RelationalOperator,
    pub output_cols: Vec<ElementSymbol>,
    pub with: Vec<WithItem>,
    /// WITH 列表是否随外层查询整体下推；否则运行期求值
    pub with_pushdown: bool,
}

/// 所有算子共有的字段
#[derive(Debug, Clone, Default)]
pub struct OperatorCommon {
    pub id: i64,
    pub output_cols: Vec<ElementSymbol>,
    pub estimates: CostEstimates,
}

/// INSERT 执行模式，按源能力从高到低选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    Iterator,
    Bulk,
    Batched,
    SingleRow,
}

/// 连接算子的执行策略
#[derive(Debug, Clone)]
pub enum JoinStrategyOp {
    NestedLoop,
    Merge {
        left_sort: Vec<OrderByItem>,
        right_sort: Vec<OrderByItem>,
    },
    EnhancedMerge {
        left_sort: Vec<OrderByItem>,
        right_sort: Vec<OrderByItem>,
    },
    NestedTable {
        left_correlation: Option<SymbolMap>,
        right_correlation: Option<SymbolMap>,
    },
}

/// 连接语义；INTERSECT/EXCEPT 经半连接/反半连接实现
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSemantics {
    Normal,
    Semi,
    AntiSemi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Sort,
    SortDistinct,
}

/// 可执行算子
#[derive(Debug, Clone)]
pub enum RelationalOperator {
    /// 外部数据源访问
    Access {
        common: OperatorCommon,
        model: Option<String>,
        command: Command,
    },
    /// 执行已编译的嵌套命令子计划
    PlanExecution {
        common: OperatorCommon,
        plan: Box<ProcessorPlan>,
    },
    /// 依赖连接驱动的过程执行
    DependentProcedure {
        common: OperatorCommon,
        plan: Box<ProcessorPlan>,
        correlated_refs: SymbolMap,
    },
    Project {
        common: OperatorCommon,
        cols: Vec<SelectItem>,
        child: Box<RelationalOperator>,
    },
    /// 投影写入外部目标
    ProjectInto {
        common: OperatorCommon,
        target: GroupSymbol,
        columns: Vec<ElementSymbol>,
        mode: InsertMode,
        child: Box<RelationalOperator>,
    },
    /// 虚拟目标的插入计划执行
    InsertPlanExecution {
        common: OperatorCommon,
        target: GroupSymbol,
        child: Box<RelationalOperator>,
    },
    Join {
        common: OperatorCommon,
        join_type: JoinType,
        strategy: JoinStrategyOp,
        semantics: JoinSemantics,
        /// 等值条件之外的残余谓词，任何策略下都随算子执行
        criteria: Vec<Expression>,
        left: Box<RelationalOperator>,
        right: Box<RelationalOperator>,
    },
    Select {
        common: OperatorCommon,
        criteria: Expression,
        child: Box<RelationalOperator>,
    },
    Sort {
        common: OperatorCommon,
        items: Vec<OrderByItem>,
        mode: SortMode,
        child: Box<RelationalOperator>,
    },
    DupRemove {
        common: OperatorCommon,
        child: Box<RelationalOperator>,
    },
    Group {
        common: OperatorCommon,
        group_cols: Vec<Expression>,
        aggregates: Vec<SelectItem>,
        child: Box<RelationalOperator>,
    },
    UnionAll {
        common: OperatorCommon,
        children: Vec<RelationalOperator>,
    },
    Limit {
        common: OperatorCommon,
        offset: Option<Expression>,
        limit: Option<Expression>,
        child: Box<RelationalOperator>,
    },
    /// 表值函数求值（XMLTABLE / TEXTTABLE / ARRAYTABLE）
    TableFunctionScan {
        common: OperatorCommon,
        function: TableFunction,
    },
    Null {
        common: OperatorCommon,
    },
}

impl RelationalOperator {
    pub fn common(&self) -> &OperatorCommon {
        match self {
            RelationalOperator::Access { common, .. }
            | RelationalOperator::PlanExecution { common, .. }
            | RelationalOperator::DependentProcedure { common, .. }
            | RelationalOperator::Project { common, .. }
            | RelationalOperator::ProjectInto { common, .. }
            | RelationalOperator::InsertPlanExecution { common, .. }
            | RelationalOperator::Join { common, .. }
            | RelationalOperator::Select { common, .. }
            | RelationalOperator::Sort { common, .. }
            | RelationalOperator::DupRemove { common, .. }
            | RelationalOperator::Group { common, .. }
            | RelationalOperator::UnionAll { common, .. }
            | RelationalOperator::Limit { common, .. }
            | RelationalOperator::TableFunctionScan { common, .. }
            | RelationalOperator::Null { common } => common,
        }
    }

    pub fn id(&self) -> i64 {
        self.common().id
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RelationalOperator::Access { .. } => "AccessOp",
            RelationalOperator::PlanExecution { .. } => "PlanExecutionOp",
            RelationalOperator::DependentProcedure { .. } => "DependentProcedureOp",
            RelationalOperator::Project { .. } => "ProjectOp",
            RelationalOperator::ProjectInto { .. } => "ProjectIntoOp",
            RelationalOperator::InsertPlanExecution { .. } => "InsertPlanExecutionOp",
            RelationalOperator::Join { .. } => "JoinOp",
            RelationalOperator::Select { .. } => "SelectOp",
            RelationalOperator::Sort { .. } => "SortOp",
            RelationalOperator::DupRemove { .. } => "DupRemoveOp",
            RelationalOperator::Group { .. } => "GroupOp",
            RelationalOperator::UnionAll { .. } => "UnionAllOp",
            RelationalOperator::Limit { .. } => "LimitOp",
            RelationalOperator::TableFunctionScan { .. } => "TableFunctionScanOp",
            RelationalOperator::Null { .. } => "NullOp",
        }
    }

    pub fn children(&self) -> Vec<&RelationalOperator> {
        match self {
            RelationalOperator::Project { child, .. }
            | RelationalOperator::ProjectInto { child, .. }
            | RelationalOperator::InsertPlanExecution { child, .. }
            | RelationalOperator::Select { child, .. }
            | RelationalOperator::Sort { child, .. }
            | RelationalOperator::DupRemove { child, .. }
            | RelationalOperator::Group { child, .. }
            | RelationalOperator::Limit { child, .. } => vec![child.as_ref()],
            RelationalOperator::Join { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
            RelationalOperator::UnionAll { children, .. } => children.iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn count_operators(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(|c| c.count_operators())
            .sum::<usize>()
    }

    /// 渲染为可序列化的描述树，供分析记录汇与 EXPLAIN 类出口使用
    pub fn describe(&self) -> crate::query::planner::plan::PlanDescription {
        use crate::query::planner::plan::{Pair, PlanDescription};

        let mut properties = Vec::new();
        match self {
            RelationalOperator::Access { model, command, .. } => {
                if let Some(m) = model {
                    properties.push(Pair::new("model", m));
                }
                properties.push(Pair::new("isQuery", command.is_query()));
            }
            RelationalOperator::ProjectInto { target, mode, .. } => {
                properties.push(Pair::new("into", target.name()));
                properties.push(Pair::new("mode", format!("{:?}", mode)));
            }
            RelationalOperator::InsertPlanExecution { target, .. } => {
                properties.push(Pair::new("into", target.name()));
            }
            RelationalOperator::Join {
                strategy,
                semantics,
                ..
            } => {
                properties.push(Pair::new("strategy", format!("{:?}", strategy)));
                properties.push(Pair::new("semantics", format!("{:?}", semantics)));
            }
            RelationalOperator::Select { criteria, .. } => {
                properties.push(Pair::new("criteria", criteria));
            }
            RelationalOperator::Sort { mode, .. } => {
                properties.push(Pair::new("mode", format!("{:?}", mode)));
            }
            RelationalOperator::Limit { offset, limit, .. } => {
                if let Some(o) = offset {
                    properties.push(Pair::new("offset", o));
                }
                if let Some(l) = limit {
                    properties.push(Pair::new("limit", l));
                }
            }
            _ => {}
        }
        if let Some(card) = self.common().estimates.cardinality {
            properties.push(Pair::new("cardinality", card));
        }

        let mut children: Vec<PlanDescription> =
            self.children().into_iter().map(|c| c.describe()).collect();
        match self {
            RelationalOperator::PlanExecution { plan, .. }
            | RelationalOperator::DependentProcedure { plan, .. } => {
                children.push(plan.root.describe());
            }
            _ => {}
        }

        PlanDescription {
            name: self.type_name().to_string(),
            id: self.id(),
            properties,
            children,
        }
    }

    /// 校验整棵算子树内 ID 互不相同
    pub fn ids_unique(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![self];
        while let Some(op) = stack.pop() {
            if !seen.insert(op.id()) {
                return false;
            }
            stack.extend(op.children());
            match op {
                RelationalOperator::PlanExecution { plan, .. }
                | RelationalOperator::DependentProcedure { plan, .. } => {
                    stack.push(&plan.root);
                }
                _ => {}
            }
        }
        true
    }
}
