//! 规范计划树构造
//!
//! 一条已解析命令进来，一棵规范（未优化）计划树出去。
//! 多表 FROM 先并成左深 CROSS 连接，视图在可合并时内联展开，
//! 否则独立编译成不透明子计划；子句按固定顺序堆叠：
//! SELECT → GROUP → HAVING → PROJECT → DUP_REMOVE → SORT → TUPLE_LIMIT。

use std::collections::{HashMap, HashSet};

use crate::core::error::CompileResult;
use crate::core::expression::criteria::separate_criteria;
use crate::core::expression::Expression;
use crate::core::symbol::{ElementSymbol, GroupSymbol, SymbolMap};
use crate::core::value::DataType;
use crate::query::command::{
    Command, CreateCommand, DeleteCommand, DropCommand, FromClause, InsertCommand, JoinType,
    ProcedureCommand, QueryCommand, SelectItem, SetQueryCommand, UpdateCommand, WithItem,
};
use crate::query::metadata::{Annotation, Severity};
use crate::query::planner::hints::PlanHints;
use crate::query::planner::plan::nodes::{
    AccessNode, DupRemoveNode, GroupNode, IntoTarget, JoinNode, JoinStrategy, NullNode,
    ProjectNode, RelNode, SelectNode, SetOpNode, SortNode, SourceNode, TupleLimitNode,
};
use crate::query::planner::security::{MutationCompensation, SecurityInjector};
use crate::query::PlanEnv;

/// 规划结果：规范树、特征提示与 WITH 下推候选信息
#[derive(Debug)]
pub struct PlannedCommand {
    pub root: RelNode,
    pub hints: PlanHints,
    pub with_items: Vec<WithItem>,
    /// 所有 WITH 成员都可下推到的公共模型
    pub cte_model: Option<String>,
}

/// 关系规划器；一次编译请求构造一个实例
pub struct RelationalPlanner<'a> {
    env: &'a mut PlanEnv,
    hints: PlanHints,
    with_items: Vec<WithItem>,
    cte_model: Option<String>,
    /// WITH 成员名 -> 定义命令，FROM 引用按视图内联
    with_definitions: HashMap<String, Command>,
    /// 词法作用域栈：每层查询可见的组
    scope_groups: Vec<Vec<GroupSymbol>>,
    /// 顶层命令声明的依赖提示 (组名, 是否依赖)
    pending_dep_hints: Vec<(String, bool)>,
}

impl<'a> RelationalPlanner<'a> {
    pub fn new(env: &'a mut PlanEnv) -> Self {
        Self {
            env,
            hints: PlanHints::new(),
            with_items: Vec::new(),
            cte_model: None,
            with_definitions: HashMap::new(),
            scope_groups: Vec::new(),
            pending_dep_hints: Vec::new(),
        }
    }

    /// 规划入口
    pub fn plan(mut self, command: Command) -> CompileResult<PlannedCommand> {
        let root = self.plan_command(command)?;

        // 整树分配节点 ID
        let mut root = root.transform_down(&mut |mut node| {
            node.set_id(self.env.ids.next_id());
            Ok(node)
        })?;

        root = self.distribute_dependent_hints(root)?;

        Ok(PlannedCommand {
            root,
            hints: self.hints,
            with_items: self.with_items,
            cte_model: self.cte_model,
        })
    }

    fn plan_command(&mut self, command: Command) -> CompileResult<RelNode> {
        match command {
            Command::Query(q) => self.plan_query(q),
            Command::SetQuery(sq) => self.plan_set_query(sq),
            Command::Insert(ins) => self.plan_insert(ins),
            Command::Update(upd) => self.plan_update(upd),
            Command::Delete(del) => self.plan_delete(del),
            Command::StoredProcedure(proc) => self.plan_procedure(proc),
            Command::Create(create) => self.plan_create(create),
            Command::Drop(drop) => self.plan_drop(drop),
        }
    }

    fn plan_query(&mut self, mut q: QueryCommand) -> CompileResult<RelNode> {
        self.plan_with_list(std::mem::take(&mut q.with))?;

        self.pending_dep_hints.extend(collect_dep_hints(&q));

        let visible: Vec<GroupSymbol> = q.from.iter().flat_map(|f| f.groups()).collect();
        self.scope_groups.push(visible.clone());

        // 多表 FROM 并为单棵左深 CROSS 连接树，后续只处理一元/二元形态
        let mut root = match merge_from(std::mem::take(&mut q.from)) {
            Some(clause) => self.plan_from_clause(clause, q.option.no_cache)?,
            None => NullNode::new().into_node(),
        };

        // WHERE：拆成合取链，一个条件一个节点
        if let Some(criteria) = q.criteria.take() {
            self.hints.has_criteria = true;
            for conjunct in separate_criteria(&criteria) {
                root = self.build_select(conjunct, root, false)?;
            }
        }

        // GROUP / HAVING
        let mut aggregates: Vec<SelectItem> = Vec::new();
        for item in &q.select.items {
            if item.expr.has_aggregate() {
                aggregates.push(item.clone());
            }
        }
        if !q.group_by.is_empty() || !aggregates.is_empty() {
            self.hints.has_aggregates = true;
            let mut node = GroupNode::new(q.group_by.clone(), aggregates, Some(root));
            node.set_groups(visible.clone());
            root = node.into_node();
        }
        if let Some(having) = q.having.take() {
            self.hints.has_criteria = true;
            for conjunct in separate_criteria(&having) {
                root = self.build_select(conjunct, root, true)?;
            }
        }

        // PROJECT，列掩码在此替换
        let mut items = q.select.items.clone();
        {
            let injector = SecurityInjector::new(
                self.env.metadata.as_ref(),
                self.env.capabilities.as_ref(),
                &self.env.context,
            );
            for item in &mut items {
                let snapshot = item.expr.clone();
                if let Expression::Element(e) = &snapshot {
                    if let Some(g) = e.group() {
                        if !g.is_virtual() {
                            if let Some(mask) =
                                injector.column_mask(g, &snapshot, e.short_name())?
                            {
                                item.expr = mask;
                            }
                        }
                    }
                }
                if matches!(item.expr, Expression::Function { .. }) {
                    self.hints.has_function_based_columns = true;
                }
            }
        }
        let output_symbols: Vec<ElementSymbol> =
            items.iter().map(|i| i.symbol.clone()).collect();
        let mut project = ProjectNode::new(items, Some(root));
        project.set_output_cols(output_symbols);
        let mut root = project.into_node();

        if q.select.distinct {
            root = DupRemoveNode::new(Some(root)).into_node();
        }
        if !q.order_by.is_empty() {
            root = SortNode::new(q.order_by.clone(), Some(root)).into_node();
        }
        if let Some(limit) = q.limit.take() {
            self.hints.has_limit = true;
            root = TupleLimitNode::new(limit.offset, limit.limit, Some(root)).into_node();
        }

        self.scope_groups.pop();
        Ok(root)
    }

    /// 建一个 SELECT 节点并检测其子查询的相关引用
    fn build_select(
        &mut self,
        conjunct: Expression,
        child: RelNode,
        is_having: bool,
    ) -> CompileResult<RelNode> {
        let mut node = if is_having {
            SelectNode::having(conjunct, Some(child))
        } else {
            SelectNode::new(conjunct, Some(child))
        };

        let enclosing: Vec<GroupSymbol> =
            self.scope_groups.iter().flatten().cloned().collect();
        let mut correlations = Vec::new();
        for container in subquery_commands(&node.criteria) {
            let map = correlated_map(container, &enclosing);
            if map.is_empty() {
                self.env.sink.record_line(format!(
                    "不相关子查询只求值一次: {}",
                    node.criteria
                ));
            }
            correlations.push(map);
        }
        node.subquery_correlations = correlations;

        let groups: Vec<GroupSymbol> = node
            .criteria
            .elements()
            .iter()
            .filter_map(|e| e.group().cloned())
            .collect();
        for g in groups {
            node.add_group(g);
        }
        Ok(node.into_node())
    }

    fn plan_with_list(&mut self, with: Vec<WithItem>) -> CompileResult<()> {
        if with.is_empty() {
            return Ok(());
        }

        let mut models: Vec<Option<String>> = Vec::new();
        for item in &with {
            self.with_definitions
                .insert(item.name.name().to_string(), (*item.command).clone());
            // 成员独立编译，检查其优化后的计划是否针对单一源
            let compiled = crate::query::compile((*item.command).clone(), self.env)?;
            models.push(crate::query::pushable_model(&compiled));
            self.with_items.push(item.clone());
        }

        let common = match models.split_first() {
            Some((first, rest)) if first.is_some() && rest.iter().all(|m| m == first) => {
                first.clone()
            }
            _ => None,
        };
        match common {
            Some(model) => {
                self.env.sink.annotate(Annotation::new(
                    "common-table-expression",
                    format!("WITH 列表尝试整体下推到模型 {}", model),
                    Severity::Low,
                ));
                self.cte_model = Some(model);
            }
            None => {
                self.env.sink.annotate(Annotation::new(
                    "common-table-expression",
                    "WITH 成员不满足单一源条件，运行期求值",
                    Severity::Low,
                ));
            }
        }
        Ok(())
    }

    fn plan_from_clause(
        &mut self,
        clause: FromClause,
        no_cache: bool,
    ) -> CompileResult<RelNode> {
        match clause {
            FromClause::Group(group) => self.plan_group(group, no_cache),
            FromClause::Join {
                left,
                right,
                join_type,
                criteria,
                optional,
            } => {
                self.hints.has_join = true;
                if optional {
                    self.hints.has_optional_join = true;
                }

                // FROM 子查询侧的相关引用以对侧组为界
                let left_groups = left.groups();
                let right_groups = right.groups();
                let left_corr = match left.as_ref() {
                    FromClause::Subquery { command, .. } => {
                        Some(correlated_map(command, &right_groups))
                    }
                    _ => None,
                };
                let right_corr = match right.as_ref() {
                    FromClause::Subquery { command, .. } => {
                        Some(correlated_map(command, &left_groups))
                    }
                    _ => None,
                };

                let left_node = self.plan_from_clause(*left, no_cache)?;
                let right_node = self.plan_from_clause(*right, no_cache)?;

                let mut join = JoinNode::new(join_type, left_node, right_node)
                    .with_criteria(criteria);
                join.optional = optional;
                join.left_correlation = left_corr.filter(|m| !m.is_empty());
                join.right_correlation = right_corr.filter(|m| !m.is_empty());
                for g in left_groups.into_iter().chain(right_groups) {
                    join.add_group(g);
                }
                if join.left_correlation.is_some() || join.right_correlation.is_some() {
                    join.strategy = JoinStrategy::NestedTable;
                }
                Ok(join.into_node())
            }
            FromClause::Subquery { command, name } => {
                self.plan_nested_source(*command, name, no_cache)
            }
            FromClause::TableFunction { function, name } => {
                self.hints.has_function_based_columns = true;
                Ok(SourceNode::for_table_function(name, function).into_node())
            }
        }
    }

    fn plan_group(&mut self, group: GroupSymbol, no_cache: bool) -> CompileResult<RelNode> {
        // WITH 成员引用按视图内联
        if let Some(def) = self.with_definitions.get(group.name()).cloned() {
            return self.plan_nested_source(def, group, no_cache);
        }

        if group.is_procedure() {
            self.hints.has_relational_procedure = true;
        }

        let view_def = self.env.metadata.view_definition(&group)?;
        if let Some(mut definition) = view_def {
            self.hints.has_virtual_groups = true;

            // 物化重定向：存在可用物化且未被 NOCACHE 绕过
            if let Some(info) = self.env.metadata.materialization(&group)? {
                if info.enabled && !no_cache {
                    self.env.sink.annotate(Annotation::new(
                        "materialized-view",
                        format!(
                            "视图 {} 重定向到物化表 {}",
                            group.name(),
                            info.target.name()
                        ),
                        Severity::Low,
                    ));
                    let columns = self.env.metadata.elements(&group)?;
                    self.env
                        .context
                        .temp_store
                        .register(info.target.name(), columns.clone());
                    definition = materialized_query(&info.target, &columns);
                } else {
                    self.env.sink.annotate(Annotation::new(
                        "materialized-view",
                        format!("视图 {} 的物化表被绕过 (NOCACHE)", group.name()),
                        Severity::Low,
                    ));
                }
            }

            return self.plan_nested_source(definition, group, no_cache);
        }

        // 物理表
        let mut source = SourceNode::for_group(group.clone());
        let elements = self.env.metadata.elements(&group)?;
        source.set_output_cols(elements);
        let mut node = source.into_node();

        // 行级安全过滤器
        let filter = {
            let injector = SecurityInjector::new(
                self.env.metadata.as_ref(),
                self.env.capabilities.as_ref(),
                &self.env.context,
            );
            injector.row_filter(&group)?
        };
        if let Some(filter) = filter {
            self.hints.has_criteria = true;
            for conjunct in separate_criteria(&filter) {
                let mut select = SelectNode::new(conjunct, Some(node));
                select.add_group(group.clone());
                node = select.into_node();
            }
        }
        Ok(node)
    }

    /// 嵌套命令作为来源：可合并时内联，否则独立编译挂为不透明子计划
    fn plan_nested_source(
        &mut self,
        command: Command,
        name: GroupSymbol,
        no_cache: bool,
    ) -> CompileResult<RelNode> {
        self.hints.has_virtual_groups = true;

        let outer_elements = match self.env.metadata.elements(&name) {
            Ok(elements) => elements,
            // WITH 成员与匿名内联视图不在目录里，从投影推导
            Err(_) => command
                .projected_symbols()
                .iter()
                .map(|sym| {
                    ElementSymbol::with_group(
                        format!("{}.{}", name.name(), sym.short_name()),
                        name.clone(),
                        sym.data_type(),
                    )
                })
                .collect(),
        };

        if mergeable(&command) {
            let inner_exprs = projected_expressions(&command);
            let child = self.plan_command(command)?;

            let mut map = SymbolMap::new();
            for (outer, inner) in outer_elements.iter().zip(inner_exprs.into_iter()) {
                map.insert(Expression::Element(outer.clone()), inner);
            }

            let mut source = SourceNode::for_group(name);
            source.symbol_map = Some(map);
            source.set_output_cols(outer_elements);
            source.set_child(child);
            Ok(source.into_node())
        } else {
            self.env.sink.record_line(format!(
                "嵌套命令不可合并，独立编译: {}",
                name.name()
            ));
            let subplan = crate::query::compile(command, self.env)?;
            let access = AccessNode::for_subplan(subplan);

            let mut map = SymbolMap::new();
            for outer in &outer_elements {
                map.insert(
                    Expression::Element(outer.clone()),
                    Expression::Element(outer.clone()),
                );
            }
            let mut source = SourceNode::for_group(name);
            source.symbol_map = Some(map);
            source.set_output_cols(outer_elements);
            source.set_child(access.into_node());
            Ok(source.into_node())
        }
    }

    fn plan_set_query(&mut self, sq: SetQueryCommand) -> CompileResult<RelNode> {
        self.hints.has_set_query = true;

        // 分区分析在消费命令结构前进行；结果作为下游分解规则的提示
        let partition = crate::query::planner::partition::analyze(&sq);

        self.plan_with_list(sq.with)?;

        let left = self.plan_command(*sq.left)?;
        let right = self.plan_command(*sq.right)?;
        let mut node = SetOpNode::new(sq.op, sq.all, left, right);
        if !partition.is_empty() {
            self.env.sink.record_line(format!(
                "UNION ALL 分区列: {:?}",
                partition.columns().collect::<Vec<_>>()
            ));
            node.partition_info = Some(partition);
        }
        let output = node.left.output_cols().to_vec();
        node.set_output_cols(output);
        let mut root = node.into_node();

        if !sq.order_by.is_empty() {
            root = SortNode::new(sq.order_by, Some(root)).into_node();
        }
        if let Some(limit) = sq.limit {
            self.hints.has_limit = true;
            root = TupleLimitNode::new(limit.offset, limit.limit, Some(root)).into_node();
        }
        Ok(root)
    }

    fn plan_insert(&mut self, mut ins: InsertCommand) -> CompileResult<RelNode> {
        {
            let injector = SecurityInjector::new(
                self.env.metadata.as_ref(),
                self.env.capabilities.as_ref(),
                &self.env.context,
            );
            injector.compensate_insert(&mut ins)?;
        }

        let target = ins.group.clone();
        let columns = ins.columns.clone();
        let query = ins.query.take();

        let mut source = SourceNode::for_command(Command::Insert(ins));
        source.add_group(target.clone());
        source.group = Some(target.clone());

        let mut project = if let Some(select) = query {
            // INSERT…SELECT：SELECT 计划挂为 SOURCE 的子节点，
            // 目标组记录在 PROJECT 上供转换器选择执行模式
            let child = self.plan_command(*select)?;
            source.set_child(child);
            ProjectNode::new(
                vec![update_count_item()],
                Some(source.into_node()),
            )
            .with_into(IntoTarget {
                group: target,
                columns,
            })
        } else {
            ProjectNode::new(vec![update_count_item()], Some(source.into_node()))
        };
        project.set_output_cols(vec![update_count_symbol()]);
        Ok(project.into_node())
    }

    fn plan_update(&mut self, mut upd: UpdateCommand) -> CompileResult<RelNode> {
        let compensation = {
            let injector = SecurityInjector::new(
                self.env.metadata.as_ref(),
                self.env.capabilities.as_ref(),
                &self.env.context,
            );
            let filter = injector.row_filter(&upd.group)?;
            if let Some(filter) = &filter {
                // 读侧：过滤器限定可见行
                upd.criteria = Some(match upd.criteria.take() {
                    Some(c) => Expression::and(c, filter.clone()),
                    None => filter.clone(),
                });
            }
            injector.compensate_update(&mut upd)?
        };

        if let MutationCompensation::RowProcedure(procedure) = compensation {
            self.env.sink.annotate(Annotation::new(
                "row-security",
                format!("更新 {} 改写为逐行补偿过程", upd.group.name()),
                Severity::Medium,
            ));
            return self.plan_command(procedure);
        }

        self.hints.has_criteria |= upd.criteria.is_some();
        let target = upd.group.clone();
        let mut source = SourceNode::for_command(Command::Update(upd));
        source.add_group(target.clone());
        source.group = Some(target);
        let mut project =
            ProjectNode::new(vec![update_count_item()], Some(source.into_node()));
        project.set_output_cols(vec![update_count_symbol()]);
        Ok(project.into_node())
    }

    fn plan_delete(&mut self, mut del: DeleteCommand) -> CompileResult<RelNode> {
        {
            let injector = SecurityInjector::new(
                self.env.metadata.as_ref(),
                self.env.capabilities.as_ref(),
                &self.env.context,
            );
            if let Some(filter) = injector.row_filter(&del.group)? {
                del.criteria = Some(match del.criteria.take() {
                    Some(c) => Expression::and(c, filter),
                    None => filter,
                });
            }
        }

        self.hints.has_criteria |= del.criteria.is_some();
        let target = del.group.clone();
        let mut source = SourceNode::for_command(Command::Delete(del));
        source.add_group(target.clone());
        source.group = Some(target);
        let mut project =
            ProjectNode::new(vec![update_count_item()], Some(source.into_node()));
        project.set_output_cols(vec![update_count_symbol()]);
        Ok(project.into_node())
    }

    fn plan_procedure(&mut self, proc: ProcedureCommand) -> CompileResult<RelNode> {
        self.hints.has_relational_procedure = true;

        let name = proc.group.clone();
        let result_columns = proc.result_columns.clone();
        let mut source = SourceNode::for_command(Command::StoredProcedure(proc));
        source.add_group(name.clone());
        source.group = Some(name);
        source.set_output_cols(result_columns.clone());

        let items = result_columns
            .iter()
            .map(|sym| SelectItem::new(Expression::Element(sym.clone()), sym.clone()))
            .collect();
        let mut project = ProjectNode::new(items, Some(source.into_node()));
        project.set_output_cols(result_columns);
        Ok(project.into_node())
    }

    fn plan_create(&mut self, create: CreateCommand) -> CompileResult<RelNode> {
        let target = create.group.clone();
        let mut source = SourceNode::for_command(Command::Create(create));
        source.add_group(target.clone());
        source.group = Some(target);
        let mut project =
            ProjectNode::new(vec![update_count_item()], Some(source.into_node()));
        project.set_output_cols(vec![update_count_symbol()]);
        Ok(project.into_node())
    }

    fn plan_drop(&mut self, drop: DropCommand) -> CompileResult<RelNode> {
        let target = drop.group.clone();
        let mut source = SourceNode::for_command(Command::Drop(drop));
        source.add_group(target.clone());
        source.group = Some(target);
        let mut project =
            ProjectNode::new(vec![update_count_item()], Some(source.into_node()));
        project.set_output_cols(vec![update_count_symbol()]);
        Ok(project.into_node())
    }

    /// 依赖提示分发：精确名 → 定义名 → 元数据部分名查找
    fn distribute_dependent_hints(&mut self, root: RelNode) -> CompileResult<RelNode> {
        let hints = std::mem::take(&mut self.pending_dep_hints);
        let mut root = root;
        for (name, dependent) in hints {
            let mut matched = false;

            root = root.transform(&mut |mut node| {
                if let RelNode::Source(source) = &mut node {
                    if let Some(group) = &source.group {
                        let hit = group.name() == name
                            || group.definition() == Some(name.as_str());
                        if hit {
                            source.dependent_hint = Some(dependent);
                            matched = true;
                        }
                    }
                }
                Ok(node)
            })?;

            if !matched {
                // 部分名兜底查找
                if let Some(resolved) =
                    self.env.metadata.find_group_by_partial_name(&name)?
                {
                    root = root.transform(&mut |mut node| {
                        if let RelNode::Source(source) = &mut node {
                            if let Some(group) = &source.group {
                                if group.canonical_name() == resolved.canonical_name() {
                                    source.dependent_hint = Some(dependent);
                                    matched = true;
                                }
                            }
                        }
                        Ok(node)
                    })?;
                }
            }

            if !matched {
                // 提示匹配失败只是咨询性状况，从不报错
                log::warn!("依赖提示未匹配任何来源: {}", name);
                self.env.sink.annotate(Annotation::new(
                    "dependent-hint",
                    format!("MAKE {}DEP 提示未匹配任何来源: {}",
                        if dependent { "" } else { "NOT " }, name),
                    Severity::Low,
                ));
            }
        }
        Ok(root)
    }
}

/// 多表 FROM 并成一棵左深 CROSS 连接
fn merge_from(mut items: Vec<FromClause>) -> Option<FromClause> {
    if items.is_empty() {
        return None;
    }
    let mut merged = items.remove(0);
    for next in items {
        merged = FromClause::Join {
            left: Box::new(merged),
            right: Box::new(next),
            join_type: JoinType::Cross,
            criteria: Vec::new(),
            optional: false,
        };
    }
    Some(merged)
}

/// 嵌套命令可以安全合并进外层树吗
fn mergeable(command: &Command) -> bool {
    match command {
        Command::Query(q) => !q.is_xml && q.with.is_empty(),
        Command::SetQuery(sq) => sq.with.is_empty(),
        _ => false,
    }
}

/// 查询类命令的投影表达式
fn projected_expressions(command: &Command) -> Vec<Expression> {
    match command {
        Command::Query(q) => q.select.items.iter().map(|i| i.expr.clone()).collect(),
        Command::SetQuery(_) => command
            .projected_symbols()
            .into_iter()
            .map(Expression::Element)
            .collect(),
        _ => Vec::new(),
    }
}

/// 物化重定向：SELECT <列> FROM <物化表>
fn materialized_query(target: &GroupSymbol, columns: &[ElementSymbol]) -> Command {
    let items = columns
        .iter()
        .map(|col| {
            let redirected = ElementSymbol::with_group(
                format!("{}.{}", target.name(), col.short_name()),
                target.clone(),
                col.data_type(),
            );
            SelectItem::new(Expression::Element(redirected.clone()), redirected)
        })
        .collect();
    Command::Query(QueryCommand {
        select: crate::query::command::SelectClause {
            distinct: false,
            items,
        },
        from: vec![FromClause::Group(target.clone())],
        ..Default::default()
    })
}

fn update_count_symbol() -> ElementSymbol {
    ElementSymbol::new("rows_updated", DataType::Long)
}

fn update_count_item() -> SelectItem {
    let sym = update_count_symbol();
    SelectItem::new(Expression::Element(sym.clone()), sym)
}

fn collect_dep_hints(q: &QueryCommand) -> Vec<(String, bool)> {
    let mut out = Vec::new();
    for name in &q.option.dependent_groups {
        out.push((name.clone(), true));
    }
    for name in &q.option.not_dependent_groups {
        out.push((name.clone(), false));
    }
    out
}

/// 条件里的子查询命令，按出现顺序
fn subquery_commands(expr: &Expression) -> Vec<&Command> {
    let mut out = Vec::new();
    collect_commands(expr, &mut out);
    out
}

fn collect_commands<'e>(expr: &'e Expression, out: &mut Vec<&'e Command>) {
    match expr {
        Expression::ScalarSubquery(c) => out.push(c),
        Expression::Exists { command, .. } => out.push(command),
        Expression::InSubquery { expr, command, .. } => {
            collect_commands(expr, out);
            out.push(command);
        }
        Expression::Binary { left, right, .. } => {
            collect_commands(left, out);
            collect_commands(right, out);
        }
        Expression::Unary { operand, .. } => collect_commands(operand, out),
        Expression::Function { args, .. } => {
            for a in args {
                collect_commands(a, out);
            }
        }
        Expression::In { expr, list, .. } => {
            collect_commands(expr, out);
            for item in list {
                collect_commands(item, out);
            }
        }
        Expression::Case {
            branches,
            otherwise,
        } => {
            for (w, t) in branches {
                collect_commands(w, out);
                collect_commands(t, out);
            }
            if let Some(e) = otherwise {
                collect_commands(e, out);
            }
        }
        Expression::Cast { expr, .. } => collect_commands(expr, out),
        _ => {}
    }
}

/// 嵌套命令对外层组的自由引用
///
/// 引用的组不在嵌套命令自己定义的组里、且出现在外层可见组中，
/// 即为相关引用；映射键值都是该引用本身。
pub fn correlated_map(command: &Command, enclosing: &[GroupSymbol]) -> SymbolMap {
    let defined = command_defined_groups(command);
    let mut map = SymbolMap::new();
    for element in command_element_refs(command) {
        if let Some(group) = element.group() {
            if !defined.contains(group.name())
                && enclosing.iter().any(|g| g.name() == group.name())
            {
                map.insert(
                    Expression::Element(element.clone()),
                    Expression::Element(element.clone()),
                );
            }
        }
    }
    map
}

fn command_defined_groups(command: &Command) -> HashSet<String> {
    let mut out = HashSet::new();
    collect_defined_groups(command, &mut out);
    out
}

fn collect_defined_groups(command: &Command, out: &mut HashSet<String>) {
    match command {
        Command::Query(q) => {
            for clause in &q.from {
                collect_from_groups(clause, out);
            }
            for item in &q.with {
                out.insert(item.name.name().to_string());
                collect_defined_groups(&item.command, out);
            }
        }
        Command::SetQuery(sq) => {
            collect_defined_groups(&sq.left, out);
            collect_defined_groups(&sq.right, out);
        }
        _ => {}
    }
}

fn collect_from_groups(clause: &FromClause, out: &mut HashSet<String>) {
    match clause {
        FromClause::Group(g) => {
            out.insert(g.name().to_string());
        }
        FromClause::Join { left, right, .. } => {
            collect_from_groups(left, out);
            collect_from_groups(right, out);
        }
        FromClause::Subquery { command, name } => {
            out.insert(name.name().to_string());
            collect_defined_groups(command, out);
        }
        FromClause::TableFunction { name, .. } => {
            out.insert(name.name().to_string());
        }
    }
}

fn command_element_refs(command: &Command) -> Vec<ElementSymbol> {
    let mut out = Vec::new();
    let mut visit_expr = |e: &Expression| {
        out.extend(e.elements());
    };
    match command {
        Command::Query(q) => {
            for item in &q.select.items {
                visit_expr(&item.expr);
            }
            if let Some(c) = &q.criteria {
                visit_expr(c);
            }
            for e in &q.group_by {
                visit_expr(e);
            }
            if let Some(h) = &q.having {
                visit_expr(h);
            }
            for o in &q.order_by {
                visit_expr(&o.expr);
            }
            for clause in &q.from {
                if let FromClause::Subquery { command, .. } = clause {
                    out.extend(command_element_refs(command));
                }
            }
        }
        Command::SetQuery(sq) => {
            out.extend(command_element_refs(&sq.left));
            out.extend(command_element_refs(&sq.right));
        }
        Command::Update(u) => {
            for (_, v) in &u.changes {
                out.extend(v.elements());
            }
            if let Some(c) = &u.criteria {
                out.extend(c.elements());
            }
        }
        Command::Delete(d) => {
            if let Some(c) = &d.criteria {
                out.extend(c.elements());
            }
        }
        _ => {}
    }
    out
}
