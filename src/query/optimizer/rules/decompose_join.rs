//! 联合/连接分解规则
//!
//! 两侧都是带对齐分区的 UNION ALL 且连接键正好落在分区列上时，
//! Join(U(a1,a2), U(b1,b2)) 改写为 U(Join(a1,b1), Join(a2,b2))：
//! 跨分支的组合因分区两两不相交而恒为空。分区信息消费后即清除。

use crate::core::error::CompileResult;
use crate::core::expression::Expression;
use crate::query::command::{JoinType, SetOperation};
use crate::query::optimizer::{OptimizerRule, RuleContext, RuleId};
use crate::query::planner::partition::PartitionMap;
use crate::query::planner::plan::nodes::{JoinNode, RelNode, SetOpNode};

#[derive(Debug)]
pub struct DecomposeJoinRule;

impl OptimizerRule for DecomposeJoinRule {
    fn id(&self) -> RuleId {
        RuleId::DecomposeJoin
    }

    fn execute(&self, root: RelNode, _ctx: &mut RuleContext<'_>) -> CompileResult<RelNode> {
        root.transform(&mut |node| Ok(decompose_one(node)))
    }
}

fn decompose_one(node: RelNode) -> RelNode {
    let join = match node {
        RelNode::Join(j) if j.join_type == JoinType::Inner => j,
        other => return other,
    };

    let (left_col, right_col) = match partition_join_columns(&join) {
        Some(pair) => pair,
        None => return RelNode::Join(join),
    };

    let aligned = {
        let (left_union, right_union) = match (join.left.as_ref(), join.right.as_ref()) {
            (RelNode::SetOp(l), RelNode::SetOp(r)) => (l, r),
            _ => return RelNode::Join(join),
        };
        partitions_aligned(
            left_union.partition_info.as_ref(),
            &left_col,
            right_union.partition_info.as_ref(),
            &right_col,
        )
    };
    if !aligned {
        return RelNode::Join(join);
    }

    log::debug!("分区对齐，连接按 UNION 分支分解");

    let mut join = join;
    let left_union = match *std::mem::replace(
        &mut join.left,
        Box::new(crate::query::planner::plan::nodes::NullNode::new().into_node()),
    ) {
        RelNode::SetOp(s) => s,
        _ => unreachable!(),
    };
    let right_union = match *std::mem::replace(
        &mut join.right,
        Box::new(crate::query::planner::plan::nodes::NullNode::new().into_node()),
    ) {
        RelNode::SetOp(s) => s,
        _ => unreachable!(),
    };

    let mut branch_join = |l: RelNode, r: RelNode| {
        let mut j = JoinNode::new(join.join_type, l, r).with_criteria(join.criteria.clone());
        j.strategy = join.strategy;
        for g in join.groups().to_vec() {
            j.add_group(g);
        }
        j.into_node()
    };

    let first = branch_join(*left_union.left, *right_union.left);
    let second = branch_join(*left_union.right, *right_union.right);

    let mut union = SetOpNode::new(SetOperation::Union, true, first, second);
    union.set_id(join.id());
    union.set_output_cols(join.output_cols().to_vec());
    union.set_groups(join.groups().to_vec());
    // 分区提示到此消费完毕
    union.partition_info = None;
    union.into_node()
}

/// 连接等值条件正好落在两侧分区列上时给出列名对
fn partition_join_columns(join: &JoinNode) -> Option<(String, String)> {
    for eq in join.equality_criteria() {
        if let Expression::Binary { left, right, .. } = eq {
            if let (Some(l), Some(r)) = (left.as_element(), right.as_element()) {
                return Some((l.short_name().to_string(), r.short_name().to_string()));
            }
        }
    }
    None
}

fn partitions_aligned(
    left: Option<&PartitionMap>,
    left_col: &str,
    right: Option<&PartitionMap>,
    right_col: &str,
) -> bool {
    let left_sets = match left.and_then(|p| p.get(left_col)) {
        Some(s) => s,
        None => return false,
    };
    let right_sets = match right.and_then(|p| p.get(right_col)) {
        Some(s) => s,
        None => return false,
    };
    left_sets.len() == right_sets.len()
        && left_sets
            .iter()
            .zip(right_sets.iter())
            .all(|(a, b)| a == b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol::{ElementSymbol, GroupSymbol};
    use crate::core::value::DataType;
    use crate::query::planner::plan::nodes::SourceNode;
    use crate::query::planner::plan::NodeMask;

    fn partitioned_union(table: &str) -> SetOpNode {
        use crate::core::value::Value;
        use crate::query::command::{
            Command, FromClause, QueryCommand, SelectClause, SelectItem, SetQueryCommand,
        };

        let g = GroupSymbol::new(table);
        let sym = ElementSymbol::with_group(
            format!("{}.a", table),
            g.clone(),
            DataType::Integer,
        );
        let branch = |v: i64| {
            Command::Query(QueryCommand {
                select: SelectClause {
                    distinct: false,
                    items: vec![SelectItem::new(
                        Expression::Element(sym.clone()),
                        sym.clone(),
                    )],
                },
                from: vec![FromClause::Group(g.clone())],
                criteria: Some(Expression::eq(
                    Expression::Element(sym.clone()),
                    Expression::Constant(Value::Integer(v)),
                )),
                ..Default::default()
            })
        };
        let sq = SetQueryCommand {
            op: SetOperation::Union,
            all: true,
            left: Box::new(branch(1)),
            right: Box::new(branch(2)),
            order_by: vec![],
            limit: None,
            with: vec![],
        };
        let partition = crate::query::planner::partition::analyze(&sq);

        let mut union = SetOpNode::new(
            SetOperation::Union,
            true,
            SourceNode::for_group(GroupSymbol::new(format!("{}_b1", table))).into_node(),
            SourceNode::for_group(GroupSymbol::new(format!("{}_b2", table))).into_node(),
        );
        union.partition_info = Some(partition);
        union
    }

    #[test]
    fn test_aligned_partitions_decompose() {
        let left = partitioned_union("t1");
        let right = partitioned_union("t2");

        let l_col = ElementSymbol::with_group(
            "t1.a",
            GroupSymbol::new("t1"),
            DataType::Integer,
        );
        let r_col = ElementSymbol::with_group(
            "t2.a",
            GroupSymbol::new("t2"),
            DataType::Integer,
        );
        let join = JoinNode::new(
            JoinType::Inner,
            left.into_node(),
            right.into_node(),
        )
        .with_criteria(vec![Expression::eq(
            Expression::Element(l_col),
            Expression::Element(r_col),
        )]);

        let out = decompose_one(join.into_node());
        match &out {
            RelNode::SetOp(u) => {
                assert!(u.all);
                assert!(u.partition_info.is_none());
                assert!(matches!(u.left.as_ref(), RelNode::Join(_)));
                assert!(matches!(u.right.as_ref(), RelNode::Join(_)));
            }
            other => panic!("应当分解为 UNION: {:?}", other),
        }
        assert_eq!(out.find_nodes(NodeMask::JOIN).len(), 2);
    }

    #[test]
    fn test_unpartitioned_join_untouched() {
        let join = JoinNode::new(
            JoinType::Inner,
            SourceNode::for_group(GroupSymbol::new("t1")).into_node(),
            SourceNode::for_group(GroupSymbol::new("t2")).into_node(),
        );
        assert!(matches!(decompose_one(join.into_node()), RelNode::Join(_)));
    }
}
