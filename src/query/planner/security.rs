//! 行/列安全注入器
//!
//! 把访问策略元数据翻译成 SQL 层的过滤器与掩码：
//! 行过滤器在建树时织入 SELECT 节点，列掩码替换投影表达式，
//! 变更命令在编译期或运行期得到补偿。过滤器与掩码是策略配置
//! 的函数，与查询无关，因此按表/列身份记忆在目录的单飞缓存上。

use std::sync::Arc;

use crate::core::error::{CompileResult, ProcessingError};
use crate::core::expression::eval::{evaluate, RowImage, Truth};
use crate::core::expression::rewrite::simplify;
use crate::core::expression::Expression;
use crate::core::symbol::GroupSymbol;
use crate::core::value::Value;
use crate::query::command::{
    Command, InsertCommand, ProcedureCommand, UpdateCommand,
};
use crate::query::context::{CommandContext, DeterminismLevel};
use crate::query::metadata::{Capability, CapabilityFinder, CatalogMetadata};

/// 变更补偿的结果
#[derive(Debug)]
pub enum MutationCompensation {
    /// 表上没有行过滤器
    NotNeeded,
    /// 编译期对字面量求值已证明过滤器成立
    Verified,
    /// 过滤器作为运行期约束挂在命令上
    Constraint,
    /// 命令被改写为逐行重新求值过滤器的过程
    RowProcedure(Command),
}

/// 安全注入器
pub struct SecurityInjector<'a> {
    metadata: &'a dyn CatalogMetadata,
    capabilities: &'a dyn CapabilityFinder,
    context: &'a CommandContext,
}

impl<'a> SecurityInjector<'a> {
    pub fn new(
        metadata: &'a dyn CatalogMetadata,
        capabilities: &'a dyn CapabilityFinder,
        context: &'a CommandContext,
    ) -> Self {
        Self {
            metadata,
            capabilities,
            context,
        }
    }

    /// 表的组合行过滤器
    ///
    /// 所有适用策略的条件 AND 起来；无条件授权贡献 TRUE。
    /// 组合结果化简为 TRUE 时返回 None（无需过滤的哨兵值）。
    pub fn row_filter(&self, group: &GroupSymbol) -> CompileResult<Option<Expression>> {
        let table = group.canonical_name();
        let policies = self.context.policies.row_policies(table);
        if policies.is_empty() {
            return Ok(None);
        }

        for policy in policies {
            if let Some(condition) = &policy.condition {
                validate_policy_expression(condition, &policy.name)?;
            }
        }

        let key = format!(
            "rowfilter:{:x}:{}",
            self.context.policies.fingerprint(),
            table
        );
        let policies_owned: Vec<_> = policies.to_vec();
        let filter: Arc<Option<Expression>> = self
            .metadata
            .derived_cache()
            .get_or_compute(&key, move || {
                let mut combined = Expression::TRUE;
                for policy in &policies_owned {
                    let condition = policy
                        .condition
                        .clone()
                        .unwrap_or(Expression::TRUE);
                    combined = Expression::and(combined, condition);
                }
                let simplified = simplify(&combined);
                if simplified.is_true_constant() {
                    None
                } else {
                    Some(simplified)
                }
            });

        if filter.is_some() {
            // 策略逻辑参与了结果，结果随会话而变
            self.context
                .raise_determinism(DeterminismLevel::SessionDeterministic);
        }
        Ok((*filter).clone())
    }

    /// 列的掩码表达式
    ///
    /// CASE 按显式优先级降序（同序按声明顺序）排列 WHEN 分支，
    /// ELSE 保留未掩码的列，整体过标准化简遍后返回。
    pub fn column_mask(
        &self,
        group: &GroupSymbol,
        column: &Expression,
        column_short_name: &str,
    ) -> CompileResult<Option<Expression>> {
        let table = group.canonical_name();
        let policies = self.context.policies.mask_policies(table, column_short_name);
        if policies.is_empty() {
            return Ok(None);
        }

        for policy in policies {
            validate_policy_expression(&policy.mask, &policy.name)?;
            if let Some(condition) = &policy.condition {
                validate_policy_expression(condition, &policy.name)?;
            }
        }

        let column_type = column.data_type();
        let key = format!(
            "colmask:{:x}:{}.{}",
            self.context.policies.fingerprint(),
            table,
            column_short_name
        );
        let policies_owned: Vec<_> = policies.to_vec();
        let column_owned = column.clone();
        let mask: Arc<Expression> = self.metadata.derived_cache().get_or_compute(&key, move || {
            // 稳定排序保住声明顺序这一平局规则
            let mut ordered = policies_owned;
            ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

            let branches = ordered
                .iter()
                .map(|policy| {
                    let when = policy.condition.clone().unwrap_or(Expression::TRUE);
                    let mut then = policy.mask.clone();
                    if then.data_type() != column_type {
                        then = Expression::Cast {
                            expr: Box::new(then),
                            target: column_type,
                        };
                    }
                    (when, then)
                })
                .collect();

            simplify(&Expression::Case {
                branches,
                otherwise: Some(Box::new(column_owned)),
            })
        });

        self.context
            .raise_determinism(DeterminismLevel::SessionDeterministic);
        Ok(Some((*mask).clone()))
    }

    /// INSERT 的行过滤器补偿
    pub fn compensate_insert(
        &self,
        insert: &mut InsertCommand,
    ) -> CompileResult<MutationCompensation> {
        let filter = match self.row_filter(&insert.group)? {
            Some(f) => f,
            None => return Ok(MutationCompensation::NotNeeded),
        };

        if let Some(values) = &insert.values {
            if let Some(row) = literal_row(&insert.columns, values) {
                // 未赋值的列按 NULL 参与求值
                return match evaluate(&filter, &row) {
                    Truth::True => Ok(MutationCompensation::Verified),
                    _ => Err(ProcessingError::FilterNotSatisfied(format!(
                        "表 {} 的插入值不满足行级安全过滤器",
                        insert.group.name()
                    ))
                    .into()),
                };
            }
        }

        insert.constraint = Some(filter);
        Ok(MutationCompensation::Constraint)
    }

    /// UPDATE 的行过滤器补偿
    pub fn compensate_update(
        &self,
        update: &mut UpdateCommand,
    ) -> CompileResult<MutationCompensation> {
        let filter = match self.row_filter(&update.group)? {
            Some(f) => f,
            None => return Ok(MutationCompensation::NotNeeded),
        };

        let changed_columns: Vec<&str> = update
            .changes
            .iter()
            .map(|(col, _)| col.short_name())
            .collect();
        let all_constant = update.changes.iter().all(|(_, v)| v.is_constant());
        let filter_decidable = filter
            .elements()
            .iter()
            .all(|e| changed_columns.contains(&e.short_name()));

        if all_constant && filter_decidable {
            let values: Vec<Expression> =
                update.changes.iter().map(|(_, v)| v.clone()).collect();
            let columns: Vec<_> = update.changes.iter().map(|(c, _)| c.clone()).collect();
            if let Some(row) = literal_row(&columns, &values) {
                return match evaluate(&filter, &row) {
                    Truth::True => Ok(MutationCompensation::Verified),
                    _ => Err(ProcessingError::FilterNotSatisfied(format!(
                        "表 {} 的更新值不满足行级安全过滤器",
                        update.group.name()
                    ))
                    .into()),
                };
            }
        }

        let model = self.metadata.model_name(&update.group)?;
        let pushed_wholesale = model
            .as_deref()
            .map(|m| self.capabilities.supports(m, Capability::Criteria))
            .unwrap_or(false);

        if !pushed_wholesale {
            // 引擎逐行执行的更新可以携带运行期约束
            update.constraint = Some(filter);
            return Ok(MutationCompensation::Constraint);
        }

        // 整体下推的更新带不动引擎约束，改写为逐行过程；
        // 过程按唯一键寻址行，要求源支持等值谓词
        let keys = self.metadata.unique_keys(&update.group)?;
        let usable_key = keys.into_iter().next();
        let supports_equality = model
            .as_deref()
            .map(|m| self.capabilities.supports(m, Capability::EqualityPredicate))
            .unwrap_or(false);

        match (usable_key, supports_equality) {
            (Some(key), true) => {
                let mut params: Vec<(String, Expression)> = vec![(
                    "target".to_string(),
                    Expression::Constant(Value::String(update.group.name().to_string())),
                )];
                params.push(("constraint".to_string(), filter));
                for col in &key {
                    params.push((
                        format!("key_{}", col.short_name()),
                        Expression::Element(col.clone()),
                    ));
                }
                for (col, value) in &update.changes {
                    params.push((format!("set_{}", col.short_name()), value.clone()));
                }
                let procedure = Command::StoredProcedure(ProcedureCommand {
                    group: GroupSymbol::procedure("system.compensated_update"),
                    params,
                    result_columns: Vec::new(),
                });
                Ok(MutationCompensation::RowProcedure(procedure))
            }
            _ => Err(ProcessingError::UnpushableMutation(format!(
                "表 {} 受行级安全约束，但没有可用的唯一键或源不支持等值谓词",
                update.group.name()
            ))
            .into()),
        }
    }
}

/// 全常量时构造字面量行镜像
fn literal_row(
    columns: &[crate::core::symbol::ElementSymbol],
    values: &[Expression],
) -> Option<RowImage> {
    let mut row = RowImage::new();
    for (col, value) in columns.iter().zip(values.iter()) {
        match simplify(value) {
            Expression::Constant(v) => {
                row.insert(col.short_name().to_string(), v);
            }
            _ => return None,
        }
    }
    Some(row)
}

/// 策略表达式的语义校验
///
/// 策略条件/掩码不得包含聚合或子查询。
fn validate_policy_expression(expr: &Expression, policy_name: &str) -> CompileResult<()> {
    if expr.has_aggregate() {
        return Err(ProcessingError::PolicyValidation(format!(
            "策略 {} 的表达式包含聚合函数",
            policy_name
        ))
        .into());
    }
    if expr.has_subquery() {
        return Err(ProcessingError::PolicyValidation(format!(
            "策略 {} 的表达式包含子查询",
            policy_name
        ))
        .into());
    }
    Ok(())
}
