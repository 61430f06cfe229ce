//! 计划描述
//!
//! 把计划树渲染为可序列化的描述结构，供分析记录汇与
//! EXPLAIN 类出口使用。

use serde::Serialize;

use crate::query::planner::plan::nodes::RelNode;

#[derive(Debug, Clone, Serialize)]
pub struct Pair {
    pub key: String,
    pub value: String,
}

impl Pair {
    pub fn new(key: &str, value: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// 单个节点的描述，树形嵌套
#[derive(Debug, Clone, Serialize)]
pub struct PlanDescription {
    pub name: String,
    pub id: i64,
    pub properties: Vec<Pair>,
    pub children: Vec<PlanDescription>,
}

/// 渲染整棵计划树
pub fn describe(node: &RelNode) -> PlanDescription {
    let mut properties = Vec::new();

    match node {
        RelNode::Project(n) => {
            let cols: Vec<String> = n.cols.iter().map(|c| c.expr.to_string()).collect();
            properties.push(Pair::new("cols", cols.join(", ")));
            if let Some(into) = &n.into_target {
                properties.push(Pair::new("into", into.group.name()));
            }
        }
        RelNode::Join(n) => {
            properties.push(Pair::new("joinType", format!("{:?}", n.join_type)));
            properties.push(Pair::new("strategy", format!("{:?}", n.strategy)));
            if !n.criteria.is_empty() {
                let crit: Vec<String> = n.criteria.iter().map(|c| c.to_string()).collect();
                properties.push(Pair::new("criteria", crit.join(" AND ")));
            }
            if let Some(side) = n.dependent_side {
                properties.push(Pair::new("dependentSide", format!("{:?}", side)));
            }
        }
        RelNode::Access(n) => {
            if let Some(model) = &n.model {
                properties.push(Pair::new("model", model));
            }
            if n.is_subplan() {
                properties.push(Pair::new("subplan", "true"));
            }
        }
        RelNode::Select(n) => {
            properties.push(Pair::new("criteria", &n.criteria));
            if n.is_having {
                properties.push(Pair::new("having", "true"));
            }
        }
        RelNode::Sort(n) => {
            let items: Vec<String> = n
                .items
                .iter()
                .map(|i| {
                    format!(
                        "{} {}",
                        i.expr,
                        if i.ascending { "ASC" } else { "DESC" }
                    )
                })
                .collect();
            properties.push(Pair::new("items", items.join(", ")));
            if n.distinct {
                properties.push(Pair::new("distinct", "true"));
            }
        }
        RelNode::Group(n) => {
            let cols: Vec<String> = n.group_cols.iter().map(|c| c.to_string()).collect();
            properties.push(Pair::new("groupCols", cols.join(", ")));
        }
        RelNode::Source(n) => {
            if let Some(g) = &n.group {
                properties.push(Pair::new("group", g.name()));
            }
            if n.is_virtual() {
                properties.push(Pair::new("virtual", "true"));
            }
            if n.table_function.is_some() {
                properties.push(Pair::new("tableFunction", "true"));
            }
        }
        RelNode::SetOp(n) => {
            properties.push(Pair::new("op", format!("{:?}", n.op)));
            properties.push(Pair::new("all", n.all));
        }
        RelNode::TupleLimit(n) => {
            if let Some(offset) = &n.offset {
                properties.push(Pair::new("offset", offset));
            }
            if let Some(limit) = &n.limit {
                properties.push(Pair::new("limit", limit));
            }
        }
        RelNode::DupRemove(_) | RelNode::Null(_) => {}
    }

    if let Some(card) = node.estimates().cardinality {
        properties.push(Pair::new("cardinality", card));
    }

    PlanDescription {
        name: node.type_name().to_string(),
        id: node.id(),
        properties,
        children: node.children().into_iter().map(describe).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::Expression;
    use crate::core::symbol::GroupSymbol;
    use crate::core::value::Value;
    use crate::query::planner::plan::nodes::{SelectNode, SourceNode};

    #[test]
    fn test_describe_nested() {
        let tree = SelectNode::new(
            Expression::Constant(Value::Boolean(true)),
            Some(SourceNode::for_group(GroupSymbol::new("pm1.g1")).into_node()),
        )
        .into_node();

        let desc = describe(&tree);
        assert_eq!(desc.name, "Select");
        assert_eq!(desc.children.len(), 1);
        assert_eq!(desc.children[0].name, "Source");
        assert!(serde_json::to_string(&desc).is_ok());
    }
}
