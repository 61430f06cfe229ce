//! RelNode 枚举定义
//!
//! 计划树节点按类型标签分变体，每个变体只内嵌自己合法的
//! 静态类型字段；稀疏性由构造保证，非法属性访问在类型层面
//! 不可表达。子节点由父节点持有，单根不变量由构造保证。

pub mod access;
pub mod group;
pub mod join;
pub mod macros;
pub mod project;
pub mod select;
pub mod set_op;
pub mod sort;
pub mod source;

use serde::Serialize;

use crate::core::expression::Expression;
use crate::core::symbol::{ElementSymbol, GroupSymbol};
use crate::query::process::ProcessorPlan;

pub use access::AccessNode;
pub use group::GroupNode;
pub use join::{JoinNode, JoinSide, JoinStrategy};
pub use project::{IntoTarget, ProjectNode};
pub use select::SelectNode;
pub use set_op::{NullNode, SetOpNode};
pub use sort::{DupRemoveNode, SortNode, TupleLimitNode};
pub use source::SourceNode;

/// 五项成本估计，原样复制进执行算子
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostEstimates {
    pub cardinality: Option<f64>,
    pub dependent_cardinality: Option<f64>,
    pub dependent_access_cardinality: Option<f64>,
    pub join_cost: Option<f64>,
    pub dependent_join_cost: Option<f64>,
}

/// 节点类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    Project,
    Join,
    Access,
    Select,
    Sort,
    DupRemove,
    Group,
    Source,
    SetOp,
    TupleLimit,
    Null,
}

impl NodeTag {
    pub const fn mask(self) -> NodeMask {
        NodeMask(1 << self as u16)
    }
}

/// 节点类型掩码，一位对应一个标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMask(u16);

impl NodeMask {
    pub const PROJECT: NodeMask = NodeTag::Project.mask();
    pub const JOIN: NodeMask = NodeTag::Join.mask();
    pub const ACCESS: NodeMask = NodeTag::Access.mask();
    pub const SELECT: NodeMask = NodeTag::Select.mask();
    pub const SORT: NodeMask = NodeTag::Sort.mask();
    pub const DUP_REMOVE: NodeMask = NodeTag::DupRemove.mask();
    pub const GROUP: NodeMask = NodeTag::Group.mask();
    pub const SOURCE: NodeMask = NodeTag::Source.mask();
    pub const SET_OP: NodeMask = NodeTag::SetOp.mask();
    pub const TUPLE_LIMIT: NodeMask = NodeTag::TupleLimit.mask();
    pub const NULL: NodeMask = NodeTag::Null.mask();

    pub const fn contains(self, tag: NodeTag) -> bool {
        self.0 & tag.mask().0 != 0
    }
}

impl std::ops::BitOr for NodeMask {
    type Output = NodeMask;

    fn bitor(self, rhs: NodeMask) -> NodeMask {
        NodeMask(self.0 | rhs.0)
    }
}

/// 对所有变体分派同一段代码
macro_rules! dispatch_node {
    ($value:expr, $node:ident => $body:expr) => {
        match $value {
            RelNode::Project($node) => $body,
            RelNode::Join($node) => $body,
            RelNode::Access($node) => $body,
            RelNode::Select($node) => $body,
            RelNode::Sort($node) => $body,
            RelNode::DupRemove($node) => $body,
            RelNode::Group($node) => $body,
            RelNode::Source($node) => $body,
            RelNode::SetOp($node) => $body,
            RelNode::TupleLimit($node) => $body,
            RelNode::Null($node) => $body,
        }
    };
}

/// 计划树节点
#[derive(Debug, Clone)]
pub enum RelNode {
    Project(ProjectNode),
    Join(JoinNode),
    Access(AccessNode),
    Select(SelectNode),
    Sort(SortNode),
    DupRemove(DupRemoveNode),
    Group(GroupNode),
    Source(SourceNode),
    SetOp(SetOpNode),
    TupleLimit(TupleLimitNode),
    Null(NullNode),
}

impl RelNode {
    pub fn tag(&self) -> NodeTag {
        match self {
            RelNode::Project(_) => NodeTag::Project,
            RelNode::Join(_) => NodeTag::Join,
            RelNode::Access(_) => NodeTag::Access,
            RelNode::Select(_) => NodeTag::Select,
            RelNode::Sort(_) => NodeTag::Sort,
            RelNode::DupRemove(_) => NodeTag::DupRemove,
            RelNode::Group(_) => NodeTag::Group,
            RelNode::Source(_) => NodeTag::Source,
            RelNode::SetOp(_) => NodeTag::SetOp,
            RelNode::TupleLimit(_) => NodeTag::TupleLimit,
            RelNode::Null(_) => NodeTag::Null,
        }
    }

    pub fn type_name(&self) -> &'static str {
        dispatch_node!(self, n => n.type_name())
    }

    pub fn id(&self) -> i64 {
        dispatch_node!(self, n => n.id())
    }

    pub fn set_id(&mut self, id: i64) {
        dispatch_node!(self, n => n.set_id(id))
    }

    pub fn output_cols(&self) -> &[ElementSymbol] {
        dispatch_node!(self, n => n.output_cols())
    }

    pub fn set_output_cols(&mut self, cols: Vec<ElementSymbol>) {
        dispatch_node!(self, n => n.set_output_cols(cols))
    }

    pub fn estimates(&self) -> &CostEstimates {
        dispatch_node!(self, n => n.estimates())
    }

    pub fn estimates_mut(&mut self) -> &mut CostEstimates {
        dispatch_node!(self, n => n.estimates_mut())
    }

    pub fn groups(&self) -> &[GroupSymbol] {
        dispatch_node!(self, n => n.groups())
    }

    pub fn add_group(&mut self, group: GroupSymbol) {
        dispatch_node!(self, n => n.add_group(group))
    }

    pub fn set_groups(&mut self, groups: Vec<GroupSymbol>) {
        dispatch_node!(self, n => n.set_groups(groups))
    }

    /// 依赖的组名集合
    pub fn group_names(&self) -> Vec<String> {
        self.groups().iter().map(|g| g.name().to_string()).collect()
    }

    pub fn children(&self) -> Vec<&RelNode> {
        match self {
            RelNode::Project(n) => n.child.iter().map(|c| c.as_ref()).collect(),
            RelNode::Join(n) => vec![n.left.as_ref(), n.right.as_ref()],
            RelNode::Access(n) => n.child.iter().map(|c| c.as_ref()).collect(),
            RelNode::Select(n) => n.child.iter().map(|c| c.as_ref()).collect(),
            RelNode::Sort(n) => n.child.iter().map(|c| c.as_ref()).collect(),
            RelNode::DupRemove(n) => n.child.iter().map(|c| c.as_ref()).collect(),
            RelNode::Group(n) => n.child.iter().map(|c| c.as_ref()).collect(),
            RelNode::Source(n) => n.child.iter().map(|c| c.as_ref()).collect(),
            RelNode::SetOp(n) => vec![n.left.as_ref(), n.right.as_ref()],
            RelNode::TupleLimit(n) => n.child.iter().map(|c| c.as_ref()).collect(),
            RelNode::Null(_) => Vec::new(),
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut RelNode> {
        match self {
            RelNode::Project(n) => n.child.iter_mut().map(|c| c.as_mut()).collect(),
            RelNode::Join(n) => vec![n.left.as_mut(), n.right.as_mut()],
            RelNode::Access(n) => n.child.iter_mut().map(|c| c.as_mut()).collect(),
            RelNode::Select(n) => n.child.iter_mut().map(|c| c.as_mut()).collect(),
            RelNode::Sort(n) => n.child.iter_mut().map(|c| c.as_mut()).collect(),
            RelNode::DupRemove(n) => n.child.iter_mut().map(|c| c.as_mut()).collect(),
            RelNode::Group(n) => n.child.iter_mut().map(|c| c.as_mut()).collect(),
            RelNode::Source(n) => n.child.iter_mut().map(|c| c.as_mut()).collect(),
            RelNode::SetOp(n) => vec![n.left.as_mut(), n.right.as_mut()],
            RelNode::TupleLimit(n) => n.child.iter_mut().map(|c| c.as_mut()).collect(),
            RelNode::Null(_) => Vec::new(),
        }
    }

    /// 取出唯一子节点（一元节点），用于透传消除
    pub fn take_single_child(&mut self) -> Option<RelNode> {
        match self {
            RelNode::Project(n) => n.child.take().map(|b| *b),
            RelNode::Access(n) => n.child.take().map(|b| *b),
            RelNode::Select(n) => n.child.take().map(|b| *b),
            RelNode::Sort(n) => n.child.take().map(|b| *b),
            RelNode::DupRemove(n) => n.child.take().map(|b| *b),
            RelNode::Group(n) => n.child.take().map(|b| *b),
            RelNode::Source(n) => n.child.take().map(|b| *b),
            RelNode::TupleLimit(n) => n.child.take().map(|b| *b),
            _ => None,
        }
    }

    /// 前序收集所有命中掩码的后代（含自身）
    pub fn find_nodes(&self, mask: NodeMask) -> Vec<&RelNode> {
        let mut out = Vec::new();
        self.collect_nodes(mask, &mut out);
        out
    }

    fn collect_nodes<'a>(&'a self, mask: NodeMask, out: &mut Vec<&'a RelNode>) {
        if mask.contains(self.tag()) {
            out.push(self);
        }
        for child in self.children() {
            child.collect_nodes(mask, out);
        }
    }

    pub fn find_first(&self, mask: NodeMask) -> Option<&RelNode> {
        if mask.contains(self.tag()) {
            return Some(self);
        }
        for child in self.children() {
            if let Some(found) = child.find_first(mask) {
                return Some(found);
            }
        }
        None
    }

    pub fn count_nodes(&self) -> usize {
        1 + self.children().iter().map(|c| c.count_nodes()).sum::<usize>()
    }

    /// 节点自身携带的表达式（不进入子查询命令内部）
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            RelNode::Project(n) => n.cols.iter().map(|item| &item.expr).collect(),
            RelNode::Join(n) => n.criteria.iter().collect(),
            RelNode::Select(n) => vec![&n.criteria],
            RelNode::Group(n) => {
                let mut out: Vec<&Expression> = n.group_cols.iter().collect();
                out.extend(n.aggregates.iter().map(|item| &item.expr));
                out
            }
            RelNode::Sort(n) => n.items.iter().map(|i| &i.expr).collect(),
            RelNode::TupleLimit(n) => {
                n.offset.iter().chain(n.limit.iter()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// 收集子树内全部子查询容器表达式
    pub fn subquery_containers(&self) -> Vec<&Expression> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            for expr in node.expressions() {
                collect_subqueries(expr, &mut out);
            }
            stack.extend(node.children());
        }
        out
    }

    /// 收集子树内已独立编译的不透明子计划
    pub fn collect_subplans(&self) -> Vec<&ProcessorPlan> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let RelNode::Access(access) = node {
                if let Some(plan) = &access.nested_plan {
                    out.push(plan.as_ref());
                }
            }
            stack.extend(node.children());
        }
        out
    }

    /// 后序变换：先变换子树，再对结果应用 `f`
    pub fn transform<F>(self, f: &mut F) -> crate::core::error::CompileResult<RelNode>
    where
        F: FnMut(RelNode) -> crate::core::error::CompileResult<RelNode>,
    {
        let node = self.transform_children(f)?;
        f(node)
    }

    /// 前序变换：先对自身应用 `f`，再变换结果的子树
    pub fn transform_down<F>(self, f: &mut F) -> crate::core::error::CompileResult<RelNode>
    where
        F: FnMut(RelNode) -> crate::core::error::CompileResult<RelNode>,
    {
        let node = f(self)?;
        node.transform_down_children(f)
    }

    fn transform_children<F>(self, f: &mut F) -> crate::core::error::CompileResult<RelNode>
    where
        F: FnMut(RelNode) -> crate::core::error::CompileResult<RelNode>,
    {
        Ok(match self {
            RelNode::Project(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform(f)?));
                }
                RelNode::Project(n)
            }
            RelNode::Join(mut n) => {
                let left = *n.left;
                let right = *n.right;
                n.left = Box::new(left.transform(f)?);
                n.right = Box::new(right.transform(f)?);
                RelNode::Join(n)
            }
            RelNode::Access(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform(f)?));
                }
                RelNode::Access(n)
            }
            RelNode::Select(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform(f)?));
                }
                RelNode::Select(n)
            }
            RelNode::Sort(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform(f)?));
                }
                RelNode::Sort(n)
            }
            RelNode::DupRemove(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform(f)?));
                }
                RelNode::DupRemove(n)
            }
            RelNode::Group(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform(f)?));
                }
                RelNode::Group(n)
            }
            RelNode::Source(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform(f)?));
                }
                RelNode::Source(n)
            }
            RelNode::SetOp(mut n) => {
                let left = *n.left;
                let right = *n.right;
                n.left = Box::new(left.transform(f)?);
                n.right = Box::new(right.transform(f)?);
                RelNode::SetOp(n)
            }
            RelNode::TupleLimit(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform(f)?));
                }
                RelNode::TupleLimit(n)
            }
            RelNode::Null(n) => RelNode::Null(n),
        })
    }

    fn transform_down_children<F>(self, f: &mut F) -> crate::core::error::CompileResult<RelNode>
    where
        F: FnMut(RelNode) -> crate::core::error::CompileResult<RelNode>,
    {
        Ok(match self {
            RelNode::Project(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform_down(f)?));
                }
                RelNode::Project(n)
            }
            RelNode::Join(mut n) => {
                let left = *n.left;
                let right = *n.right;
                n.left = Box::new(left.transform_down(f)?);
                n.right = Box::new(right.transform_down(f)?);
                RelNode::Join(n)
            }
            RelNode::Access(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform_down(f)?));
                }
                RelNode::Access(n)
            }
            RelNode::Select(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform_down(f)?));
                }
                RelNode::Select(n)
            }
            RelNode::Sort(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform_down(f)?));
                }
                RelNode::Sort(n)
            }
            RelNode::DupRemove(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform_down(f)?));
                }
                RelNode::DupRemove(n)
            }
            RelNode::Group(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform_down(f)?));
                }
                RelNode::Group(n)
            }
            RelNode::Source(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform_down(f)?));
                }
                RelNode::Source(n)
            }
            RelNode::SetOp(mut n) => {
                let left = *n.left;
                let right = *n.right;
                n.left = Box::new(left.transform_down(f)?);
                n.right = Box::new(right.transform_down(f)?);
                RelNode::SetOp(n)
            }
            RelNode::TupleLimit(mut n) => {
                if let Some(c) = n.child.take() {
                    n.child = Some(Box::new((*c).transform_down(f)?));
                }
                RelNode::TupleLimit(n)
            }
            RelNode::Null(n) => RelNode::Null(n),
        })
    }
}

fn collect_subqueries<'a>(expr: &'a Expression, out: &mut Vec<&'a Expression>) {
    if matches!(
        expr,
        Expression::ScalarSubquery(_) | Expression::Exists { .. } | Expression::InSubquery { .. }
    ) {
        out.push(expr);
    }
    match expr {
        Expression::Binary { left, right, .. } => {
            collect_subqueries(left, out);
            collect_subqueries(right, out);
        }
        Expression::Unary { operand, .. } => collect_subqueries(operand, out),
        Expression::Function { args, .. } => {
            for a in args {
                collect_subqueries(a, out);
            }
        }
        Expression::Aggregate { arg: Some(a), .. } => collect_subqueries(a, out),
        Expression::In { expr, list, .. } => {
            collect_subqueries(expr, out);
            for item in list {
                collect_subqueries(item, out);
            }
        }
        Expression::Case {
            branches,
            otherwise,
        } => {
            for (w, t) in branches {
                collect_subqueries(w, out);
                collect_subqueries(t, out);
            }
            if let Some(e) = otherwise {
                collect_subqueries(e, out);
            }
        }
        Expression::Cast { expr, .. } => collect_subqueries(expr, out),
        Expression::InSubquery { expr, .. } => collect_subqueries(expr, out),
        _ => {}
    }
}
