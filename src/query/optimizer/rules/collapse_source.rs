//! 来源收拢规则
//!
//! 规则管线的收尾：把每个访问节点吞并的子树重新合成一条
//! 源方言命令，挂回访问节点。变更/过程来源的原始命令直接
//! 透传。收拢后访问节点不再携带子树。

use crate::core::error::{CompileResult, PlannerError};
use crate::core::expression::criteria::combine_criteria;
use crate::core::expression::Expression;
use crate::core::symbol::SymbolMap;
use crate::query::command::{
    Command, FromClause, LimitClause, OrderByItem, QueryCommand, SelectClause, SelectItem,
    SetQueryCommand,
};
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::plan::nodes::RelNode;

#[derive(Debug)]
pub struct CollapseSourceRule;

impl OptimizerRule for CollapseSourceRule {
    fn id(&self) -> RuleId {
        RuleId::CollapseSource
    }

    fn execute(&self, root: RelNode, _ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        root.transform(&mut |node| {
            let mut access = match node {
                RelNode::Access(a) if !a.is_subplan() && a.command.is_none() => a,
                other => return Ok(other),
            };

            let child = match access.child.take() {
                Some(c) => *c,
                None => {
                    return Err(PlannerError::InvariantViolation(
                        "访问节点没有可收拢的子树".to_string(),
                    )
                    .into())
                }
            };

            let command = build_command(&child, access.output_cols())?;
            log::debug!("收拢访问子树为下推命令");
            access.command = Some(command);
            // 子树收拢完毕，访问节点只留命令
            access.child = None;
            Ok(RelNode::Access(access))
        })
    }
}

/// 把访问子树合成为一条命令
fn build_command(
    node: &RelNode,
    output_cols: &[crate::core::symbol::ElementSymbol],
) -> CompileResult<Command> {
    // 变更/过程来源：原始命令透传
    if let RelNode::Source(s) = node {
        if let Some(cmd) = &s.command {
            return Ok(cmd.clone());
        }
    }

    // 顶层的限制/排序剥下来，可能包着集合查询
    let mut limit: Option<LimitClause> = None;
    let mut order_by: Vec<OrderByItem> = Vec::new();
    let mut current = node;
    if let RelNode::TupleLimit(l) = current {
        limit = Some(LimitClause {
            offset: l.offset.clone(),
            limit: l.limit.clone(),
        });
        current = l
            .child
            .as_deref()
            .ok_or_else(|| PlannerError::InvariantViolation("限制节点没有子树".into()))?;
    }
    if let RelNode::Sort(s) = current {
        if !s.distinct {
            order_by = s.items.clone();
            current = s
                .child
                .as_deref()
                .ok_or_else(|| PlannerError::InvariantViolation("排序节点没有子树".into()))?;
        }
    }

    if let RelNode::SetOp(set_op) = current {
        let left = build_command(set_op.left.as_ref(), output_cols)?;
        let right = build_command(set_op.right.as_ref(), output_cols)?;
        return Ok(Command::SetQuery(SetQueryCommand {
            op: set_op.op,
            all: set_op.all,
            left: Box::new(left),
            right: Box::new(right),
            order_by,
            limit,
            with: Vec::new(),
        }));
    }

    let mut parts = QueryParts::default();
    parts.order_by = order_by;
    parts.limit = limit;
    collect(current, &mut parts)?;

    let items = match parts.select {
        Some(items) => items,
        None => output_cols
            .iter()
            .map(|sym| SelectItem::new(Expression::Element(sym.clone()), sym.clone()))
            .collect(),
    };

    Ok(Command::Query(QueryCommand {
        with: Vec::new(),
        select: SelectClause {
            distinct: parts.distinct,
            items,
        },
        from: parts.from.into_iter().collect(),
        criteria: if parts.where_criteria.is_empty() {
            None
        } else {
            Some(combine_criteria(parts.where_criteria))
        },
        group_by: parts.group_by,
        having: if parts.having.is_empty() {
            None
        } else {
            Some(combine_criteria(parts.having))
        },
        order_by: parts.order_by,
        limit: parts.limit,
        option: Default::default(),
        is_xml: false,
    }))
}

#[derive(Default)]
struct QueryParts {
    from: Option<FromClause>,
    where_criteria: Vec<Expression>,
    having: Vec<Expression>,
    select: Option<Vec<SelectItem>>,
    distinct: bool,
    group_by: Vec<Expression>,
    order_by: Vec<OrderByItem>,
    limit: Option<LimitClause>,
}

impl QueryParts {
    /// 把已收集的各子句经符号映射改写
    fn rewrite_through(&mut self, map: &SymbolMap) {
        if let Some(items) = &mut self.select {
            for item in items.iter_mut() {
                item.expr = map.apply(&item.expr);
            }
        }
        for c in &mut self.where_criteria {
            *c = map.apply(c);
        }
        for c in &mut self.having {
            *c = map.apply(c);
        }
        for e in &mut self.group_by {
            *e = map.apply(e);
        }
        for item in &mut self.order_by {
            item.expr = map.apply(&item.expr);
        }
    }
}

fn collect(node: &RelNode, parts: &mut QueryParts) -> CompileResult<()> {
    match node {
        RelNode::TupleLimit(l) => {
            if parts.limit.is_none() {
                parts.limit = Some(LimitClause {
                    offset: l.offset.clone(),
                    limit: l.limit.clone(),
                });
            }
            descend(l.child.as_deref(), parts)
        }
        RelNode::Sort(s) => {
            if s.distinct {
                parts.distinct = true;
            }
            if parts.order_by.is_empty() {
                parts.order_by = s.items.clone();
            }
            descend(s.child.as_deref(), parts)
        }
        RelNode::DupRemove(d) => {
            parts.distinct = true;
            descend(d.child.as_deref(), parts)
        }
        RelNode::Project(p) => {
            if parts.select.is_none() {
                parts.select = Some(p.cols.clone());
            } else {
                // 内联视图扁平化：已收集的外层引用经本层投影展开，
                // 外层命令不再提到已消失的中间层符号
                let mut map = SymbolMap::new();
                for item in &p.cols {
                    map.insert(
                        Expression::Element(item.symbol.clone()),
                        item.expr.clone(),
                    );
                }
                parts.rewrite_through(&map);
            }
            descend(p.child.as_deref(), parts)
        }
        RelNode::Group(g) => {
            parts.group_by = g.group_cols.clone();
            descend(g.child.as_deref(), parts)
        }
        RelNode::Select(s) => {
            if s.is_having {
                parts.having.push(s.criteria.clone());
            } else {
                parts.where_criteria.push(s.criteria.clone());
            }
            descend(s.child.as_deref(), parts)
        }
        RelNode::Join(_) | RelNode::Source(_) => {
            let clause = from_clause(node, parts)?;
            parts.from = Some(clause);
            Ok(())
        }
        other => Err(PlannerError::InvariantViolation(format!(
            "访问子树里出现了意外的 {} 节点",
            other.type_name()
        ))
        .into()),
    }
}

fn descend(child: Option<&RelNode>, parts: &mut QueryParts) -> CompileResult<()> {
    match child {
        Some(c) => collect(c, parts),
        None => Ok(()),
    }
}

/// 连接区域转成 FROM 子句；夹在中间的选择节点贡献 WHERE
fn from_clause(node: &RelNode, parts: &mut QueryParts) -> CompileResult<FromClause> {
    match node {
        RelNode::Source(s) => {
            let group = s.group.clone().ok_or_else(|| {
                PlannerError::InvariantViolation("来源节点缺少组符号".to_string())
            })?;
            Ok(FromClause::Group(group))
        }
        RelNode::Join(j) => {
            let left = from_clause(j.left.as_ref(), parts)?;
            let right = from_clause(j.right.as_ref(), parts)?;
            Ok(FromClause::Join {
                left: Box::new(left),
                right: Box::new(right),
                join_type: j.join_type,
                criteria: j.criteria.clone(),
                optional: j.optional,
            })
        }
        RelNode::Select(s) => {
            parts.where_criteria.push(s.criteria.clone());
            let child = s.child.as_deref().ok_or_else(|| {
                PlannerError::InvariantViolation("选择节点没有子树".to_string())
            })?;
            from_clause(child, parts)
        }
        other => Err(PlannerError::InvariantViolation(format!(
            "连接区域里出现了意外的 {} 节点",
            other.type_name()
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol::{ElementSymbol, GroupSymbol};
    use crate::core::value::{DataType, Value};
    use crate::query::command::JoinType;
    use crate::query::planner::plan::nodes::{
        AccessNode, JoinNode, ProjectNode, SelectNode, SourceNode,
    };

    fn sym(group: &str, name: &str) -> ElementSymbol {
        ElementSymbol::with_group(
            format!("{}.{}", group, name),
            GroupSymbol::new(group),
            DataType::Integer,
        )
    }

    fn run(tree: RelNode) -> RelNode {
        let mut env = crate::query::test_support::env_with_table(
            "g1",
            "source1",
            vec![("a", DataType::Integer)],
        );
        let hints = crate::query::planner::hints::PlanHints::new();
        let mut stack = crate::query::optimizer::RuleStack::new();
        let mut ctx = RuleContext {
            env: &mut env,
            stack: &mut stack,
            hints: &hints,
        };
        CollapseSourceRule.execute(tree, &mut ctx).unwrap()
    }

    #[test]
    fn test_select_project_collapse() {
        let a = sym("g1", "a");
        let project = ProjectNode::new(
            vec![SelectItem::new(Expression::Element(a.clone()), a.clone())],
            Some(
                SelectNode::new(
                    Expression::eq(
                        Expression::Element(a.clone()),
                        Expression::Constant(Value::Integer(1)),
                    ),
                    Some(SourceNode::for_group(GroupSymbol::new("g1")).into_node()),
                )
                .into_node(),
            ),
        );
        let access = AccessNode::new(Some("source1".into()), Some(project.into_node()));

        let out = run(access.into_node());
        if let RelNode::Access(a) = &out {
            assert!(a.child.is_none());
            match a.command.as_ref().unwrap() {
                Command::Query(q) => {
                    assert_eq!(q.select.items.len(), 1);
                    assert!(q.criteria.is_some());
                    assert!(matches!(&q.from[0], FromClause::Group(g) if g.name() == "g1"));
                }
                other => panic!("应当合成查询命令: {:?}", other),
            }
        } else {
            panic!("应当仍是访问节点");
        }
    }

    #[test]
    fn test_join_region_collapse() {
        let a = sym("g1", "a");
        let b = sym("g2", "b");
        let join = JoinNode::new(
            JoinType::Inner,
            SourceNode::for_group(GroupSymbol::new("g1")).into_node(),
            SourceNode::for_group(GroupSymbol::new("g2")).into_node(),
        )
        .with_criteria(vec![Expression::eq(
            Expression::Element(a.clone()),
            Expression::Element(b),
        )]);
        let mut access = AccessNode::new(Some("source1".into()), Some(join.into_node()));
        access.set_output_cols(vec![a]);

        let out = run(access.into_node());
        if let RelNode::Access(acc) = &out {
            match acc.command.as_ref().unwrap() {
                Command::Query(q) => {
                    assert!(matches!(&q.from[0], FromClause::Join { .. }));
                    // 输出列兜底生成投影
                    assert_eq!(q.select.items.len(), 1);
                }
                other => panic!("应当合成查询命令: {:?}", other),
            }
        }
    }

    #[test]
    fn test_mutation_command_passes_through() {
        let delete = Command::Delete(crate::query::command::DeleteCommand {
            group: GroupSymbol::new("g1"),
            criteria: None,
        });
        let mut source = SourceNode::for_command(delete.clone());
        source.group = Some(GroupSymbol::new("g1"));
        let access = AccessNode::new(Some("source1".into()), Some(source.into_node()));

        let out = run(access.into_node());
        if let RelNode::Access(a) = &out {
            assert_eq!(a.command.as_ref(), Some(&delete));
        }
    }
}
