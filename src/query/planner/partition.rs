//! 分区分析器
//!
//! 对纯 UNION ALL 分支链做静态分析：找出哪些投影列在各分支上
//! 拥有两两不相交的全常量值域。结果只作为下游剪枝/分解规则的
//! 提示，构造后不再修改，消费后即丢弃。

use std::collections::HashSet;

use crate::core::expression::criteria::separate_criteria;
use crate::core::expression::{BinaryOperator, Expression};
use crate::core::value::Value;
use crate::query::command::{QueryCommand, SetQueryCommand};

/// 投影列 -> 每个分支的常量集序列
///
/// 键是投影列的短名（各分支按同一投影位次对齐）。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionMap {
    entries: Vec<(String, Vec<HashSet<Value>>)>,
}

impl PartitionMap {
    pub fn get(&self, column: &str) -> Option<&Vec<HashSet<Value>>> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, sets)| sets)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 分析一个集合查询的分区性质
///
/// 任何非纯 UNION ALL 的形态（含任意层的 ORDER BY/LIMIT/WITH）
/// 都放弃分析并返回空结果。
pub fn analyze(set_query: &SetQueryCommand) -> PartitionMap {
    let branches = match set_query.flatten_union_all() {
        Some(b) if b.len() >= 2 => b,
        _ => return PartitionMap::default(),
    };
    analyze_branches(&branches)
}

fn analyze_branches(branches: &[&QueryCommand]) -> PartitionMap {
    let mut map = PartitionMap::default();

    for (index, branch) in branches.iter().enumerate() {
        let constants = branch_constant_sets(branch);

        if index == 0 {
            // 第一个分支播种候选列集合；此后只收缩，从不扩充
            for (column, set) in constants {
                map.entries.push((column, vec![set]));
            }
            continue;
        }

        let mut retained = Vec::new();
        for (column, mut sets) in std::mem::take(&mut map.entries) {
            match constants.iter().find(|(name, _)| *name == column) {
                Some((_, new_set)) => {
                    // 与任何先前分支的集合相交即丧失分区键资格
                    let overlaps = sets
                        .iter()
                        .any(|prior| prior.intersection(new_set).next().is_some());
                    if !overlaps {
                        sets.push(new_set.clone());
                        retained.push((column, sets));
                    }
                }
                None => {}
            }
        }
        map.entries = retained;

        if map.entries.is_empty() {
            break;
        }
    }

    map
}

/// 单个分支里受常量等值/有限 IN 列表约束的投影列
fn branch_constant_sets(branch: &QueryCommand) -> Vec<(String, HashSet<Value>)> {
    let criteria = match &branch.criteria {
        Some(c) => c,
        None => return Vec::new(),
    };

    let mut out: Vec<(String, HashSet<Value>)> = Vec::new();

    for conjunct in separate_criteria(criteria) {
        let (element, set) = match constant_restriction(&conjunct) {
            Some(pair) => pair,
            None => continue,
        };

        // 受约束的列必须确实被投影，且类型可比较
        let projected = branch.select.items.iter().find(|item| {
            item.expr
                .as_element()
                .map(|e| e == &element)
                .unwrap_or(false)
        });
        let projected = match projected {
            Some(item) => item,
            None => continue,
        };
        if !projected.symbol.data_type().is_comparable() {
            continue;
        }

        let column = projected.symbol.short_name().to_string();
        match out.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => {
                // 同列的多个约束取交集
                existing.retain(|v| set.contains(v));
            }
            None => out.push((column, set)),
        }
    }

    out.retain(|(_, set)| !set.is_empty());
    out
}

/// 合取项形如 `col = 常量` 或 `col IN (常量...)` 时返回列与常量集
fn constant_restriction(
    conjunct: &Expression,
) -> Option<(crate::core::symbol::ElementSymbol, HashSet<Value>)> {
    match conjunct {
        Expression::Binary {
            left,
            op: BinaryOperator::Eq,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (Expression::Element(e), Expression::Constant(v))
            | (Expression::Constant(v), Expression::Element(e))
                if !v.is_null() =>
            {
                let mut set = HashSet::new();
                set.insert(v.clone());
                Some((e.clone(), set))
            }
            _ => None,
        },
        Expression::In {
            expr,
            list,
            negated: false,
        } => {
            let element = expr.as_element()?;
            let mut set = HashSet::new();
            for item in list {
                match item {
                    Expression::Constant(v) if !v.is_null() => {
                        set.insert(v.clone());
                    }
                    _ => return None,
                }
            }
            Some((element.clone(), set))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol::{ElementSymbol, GroupSymbol};
    use crate::core::value::DataType;
    use crate::query::command::{
        Command, FromClause, SelectClause, SelectItem, SetOperation,
    };

    fn branch(criteria: Expression) -> Command {
        let g = GroupSymbol::new("t");
        let sym = ElementSymbol::with_group("t.a", g.clone(), DataType::Integer);
        Command::Query(QueryCommand {
            select: SelectClause {
                distinct: false,
                items: vec![SelectItem::new(
                    Expression::Element(sym.clone()),
                    sym,
                )],
            },
            from: vec![FromClause::Group(g)],
            criteria: Some(criteria),
            ..Default::default()
        })
    }

    fn col() -> Expression {
        Expression::Element(ElementSymbol::with_group(
            "t.a",
            GroupSymbol::new("t"),
            DataType::Integer,
        ))
    }

    fn int(v: i64) -> Expression {
        Expression::Constant(Value::Integer(v))
    }

    fn union_all(left: Command, right: Command) -> SetQueryCommand {
        SetQueryCommand {
            op: SetOperation::Union,
            all: true,
            left: Box::new(left),
            right: Box::new(right),
            order_by: vec![],
            limit: None,
            with: vec![],
        }
    }

    #[test]
    fn test_disjoint_equality_branches_partition() {
        // SELECT a FROM t WHERE a=1 UNION ALL SELECT a FROM t WHERE a=2
        let sq = union_all(
            branch(Expression::eq(col(), int(1))),
            branch(Expression::eq(col(), int(2))),
        );
        let map = analyze(&sq);
        assert_eq!(map.len(), 1);
        let sets = map.get("a").unwrap();
        assert_eq!(sets.len(), 2);
        assert!(sets[0].contains(&Value::Integer(1)));
        assert!(sets[1].contains(&Value::Integer(2)));
    }

    #[test]
    fn test_overlapping_in_list_drops_column() {
        // WHERE a=1 UNION ALL WHERE a IN (1,3) 在 1 上相交
        let sq = union_all(
            branch(Expression::eq(col(), int(1))),
            branch(Expression::In {
                expr: Box::new(col()),
                list: vec![int(1), int(3)],
                negated: false,
            }),
        );
        let map = analyze(&sq);
        assert!(map.is_empty());
    }

    #[test]
    fn test_unqualified_later_branch_drops_column() {
        let sq = union_all(
            branch(Expression::eq(col(), int(1))),
            branch(Expression::Binary {
                left: Box::new(col()),
                op: BinaryOperator::Gt,
                right: Box::new(int(5)),
            }),
        );
        let map = analyze(&sq);
        assert!(map.is_empty());
    }

    #[test]
    fn test_order_by_aborts_analysis() {
        let mut ordered = branch(Expression::eq(col(), int(1)));
        if let Command::Query(q) = &mut ordered {
            q.order_by.push(crate::query::command::OrderByItem {
                expr: col(),
                ascending: true,
            });
        }
        let sq = union_all(ordered, branch(Expression::eq(col(), int(2))));
        assert!(analyze(&sq).is_empty());
    }

    #[test]
    fn test_three_branches_pairwise_disjoint() {
        let inner = union_all(
            branch(Expression::eq(col(), int(1))),
            branch(Expression::eq(col(), int(2))),
        );
        let sq = union_all(
            Command::SetQuery(inner),
            branch(Expression::In {
                expr: Box::new(col()),
                list: vec![int(3), int(4)],
                negated: false,
            }),
        );
        let map = analyze(&sq);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a").unwrap().len(), 3);
    }
}
