//! 别名生成器
//!
//! 在把子树序列化回源方言 SQL 之前，重写表/列引用的输出名：
//! 下推 SQL 不暴露内部临时名，且每个子树拿到一套自洽、
//! 无冲突的命名。命名上下文是显式的作用域栈，进入嵌套作用域
//! 压栈，退出弹栈。

use std::collections::HashMap;

use crate::core::expression::Expression;
use crate::core::symbol::ElementSymbol;
use crate::query::command::{Command, FromClause, QueryCommand};

/// 单个词法作用域的命名上下文
#[derive(Debug, Default)]
struct NamingScope {
    /// 表引用名 -> 合成表别名
    table_aliases: HashMap<String, String>,
    /// (表别名, 原列短名) -> 合成列别名
    column_aliases: HashMap<(String, String), String>,
    /// 视图别名 -> 该视图导出的列别名映射
    view_elements: HashMap<String, HashMap<String, String>>,
    /// ORDER BY / LIMIT 存在时列必须可按稳定名寻址
    aliasing_required: bool,
}

impl NamingScope {
    fn new(aliasing_required: bool) -> Self {
        Self {
            aliasing_required,
            ..Default::default()
        }
    }
}

/// 别名生成器；表/视图编号在一个实例内单调递增
#[derive(Debug, Default)]
pub struct AliasGenerator {
    scopes: Vec<NamingScope>,
    table_index: usize,
    view_index: usize,
}

impl AliasGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 重写一个即将下推的命令
    pub fn visit_command(&mut self, command: &mut Command) {
        self.visit(command, false);
    }

    fn visit(&mut self, command: &mut Command, forced: bool) {
        match command {
            Command::Query(q) => self.visit_query(q, forced),
            Command::SetQuery(sq) => {
                // 最左分支正常命名，其余分支强制子别名上下文，
                // 使异构方言下各分支落在同一套别名上
                self.visit(&mut sq.left, forced);
                self.visit(&mut sq.right, true);
            }
            _ => {}
        }
    }

    fn visit_query(&mut self, q: &mut QueryCommand, forced: bool) {
        let required = forced || !q.order_by.is_empty() || q.limit.is_some();
        self.scopes.push(NamingScope::new(required));

        for clause in &mut q.from {
            self.visit_from(clause);
        }

        // 投影列按序命名 c_<ordinal>
        for (ordinal, item) in q.select.items.iter_mut().enumerate() {
            let candidate = format!("c_{}", ordinal);
            item.expr = self.rewrite_expression(&item.expr);

            let omit = !self.current_required()
                && matches!(
                    &item.expr,
                    Expression::Element(e)
                        if e.group().map(|g| !g.is_virtual()).unwrap_or(false)
                            && e.output_name() == candidate
                );
            if !omit {
                if let Some(table) = item
                    .expr
                    .as_element()
                    .and_then(|e| e.group())
                    .map(|g| g.output_name().to_string())
                {
                    self.current_mut().column_aliases.insert(
                        (table, item.symbol.short_name().to_string()),
                        candidate.clone(),
                    );
                }
                item.symbol.set_output_name(candidate);
            }
        }

        if let Some(criteria) = &q.criteria {
            q.criteria = Some(self.rewrite_expression(criteria));
        }
        q.group_by = q
            .group_by
            .iter()
            .map(|e| self.rewrite_expression(e))
            .collect();
        if let Some(having) = &q.having {
            q.having = Some(self.rewrite_expression(having));
        }

        // ORDER BY 项经由现有上下文重解析：已命名的投影列直接
        // 复用其别名，不再二次起名
        for item in &mut q.order_by {
            let projected = q.select.items.iter().find(|s| {
                s.expr
                    .as_element()
                    .zip(item.expr.as_element())
                    .map(|(a, b)| a.name() == b.name())
                    .unwrap_or(false)
            });
            match projected {
                Some(s) => {
                    let mut sym = match item.expr.as_element() {
                        Some(e) => e.clone(),
                        None => continue,
                    };
                    sym.set_output_name(s.symbol.output_name());
                    item.expr = Expression::Element(sym);
                }
                None => {
                    item.expr = self.rewrite_expression(&item.expr);
                }
            }
        }

        let scope = self
            .scopes
            .pop()
            .expect("命名作用域栈不可能为空");

        // 嵌套 FROM 子查询把自己的列别名导出到父作用域的视图映射
        if let Some(parent) = self.scopes.last_mut() {
            for (view_alias, elements) in scope.view_elements {
                parent.view_elements.insert(view_alias, elements);
            }
        }
    }

    fn visit_from(&mut self, clause: &mut FromClause) {
        match clause {
            FromClause::Group(group) => {
                let alias = if group.is_virtual() {
                    let alias = format!("v_{}", self.view_index);
                    self.view_index += 1;
                    alias
                } else {
                    let alias = format!("g_{}", self.table_index);
                    self.table_index += 1;
                    alias
                };
                self.current_mut()
                    .table_aliases
                    .insert(group.name().to_string(), alias.clone());
                group.set_output_name(alias);
            }
            FromClause::Join { left, right, .. } => {
                self.visit_from(left);
                self.visit_from(right);
            }
            FromClause::Subquery { command, name } => {
                let alias = format!("v_{}", self.view_index);
                self.view_index += 1;

                // 子查询拿到自己的子上下文，随后把列映射导出给父层
                self.visit(command, true);
                let exported = self.export_columns(command, &alias);

                let scope = self.current_mut();
                scope
                    .table_aliases
                    .insert(name.name().to_string(), alias.clone());
                scope.view_elements.insert(alias.clone(), exported);
                name.set_output_name(alias);
            }
            FromClause::TableFunction { name, .. } => {
                let alias = format!("v_{}", self.view_index);
                self.view_index += 1;
                self.current_mut()
                    .table_aliases
                    .insert(name.name().to_string(), alias.clone());
                name.set_output_name(alias);
            }
        }
    }

    fn export_columns(&self, command: &Command, _alias: &str) -> HashMap<String, String> {
        command
            .projected_symbols()
            .iter()
            .map(|sym| {
                (
                    sym.short_name().to_string(),
                    sym.output_name().to_string(),
                )
            })
            .collect()
    }

    /// 经由作用域链（内层优先）改写表达式里的引用
    fn rewrite_expression(&self, expr: &Expression) -> Expression {
        match expr {
            Expression::Element(e) => Expression::Element(self.rewrite_element(e)),
            other => other.map_children(|child| self.rewrite_expression(child)),
        }
    }

    fn rewrite_element(&self, element: &ElementSymbol) -> ElementSymbol {
        let mut out = element.clone();
        let group_name = match element.group() {
            Some(g) => g.name().to_string(),
            None => return out,
        };

        for scope in self.scopes.iter().rev() {
            if let Some(alias) = scope.table_aliases.get(&group_name) {
                let mut group = match element.group().cloned() {
                    Some(g) => g,
                    None => break,
                };
                group.set_output_name(alias.clone());
                out = ElementSymbol::with_group(
                    element.name().to_string(),
                    group,
                    element.data_type(),
                );
                // 视图列经导出的映射改名
                if let Some(col_alias) = scope
                    .view_elements
                    .get(alias)
                    .and_then(|columns| columns.get(element.short_name()))
                {
                    out.set_output_name(col_alias.clone());
                }
                break;
            }
        }
        out
    }

    fn current_mut(&mut self) -> &mut NamingScope {
        self.scopes
            .last_mut()
            .expect("命名作用域栈不可能为空")
    }

    fn current_required(&self) -> bool {
        self.scopes
            .last()
            .map(|s| s.aliasing_required)
            .unwrap_or(false)
    }
}
