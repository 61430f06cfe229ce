//! 优化规则集
//!
//! 一条规则一个文件；规则实例无状态，按标识静态分派。

pub mod assign_output_elements;
pub mod calculate_cost;
pub mod choose_dependent;
pub mod choose_join_strategy;
pub mod clean_criteria;
pub mod collapse_source;
pub mod copy_criteria;
pub mod decompose_join;
pub mod implement_join_strategy;
pub mod merge_criteria;
pub mod merge_virtual;
pub mod place_access;
pub mod plan_joins;
pub mod plan_procedures;
pub mod plan_sorts;
pub mod plan_unions;
pub mod push_aggregates;
pub mod push_limit;
pub mod push_select_criteria;
pub mod raise_access;
pub mod remove_optional_joins;

use crate::query::optimizer::{OptimizerRule, RuleId};

pub use assign_output_elements::AssignOutputElementsRule;
pub use calculate_cost::CalculateCostRule;
pub use choose_dependent::ChooseDependentRule;
pub use choose_join_strategy::ChooseJoinStrategyRule;
pub use clean_criteria::CleanCriteriaRule;
pub use collapse_source::CollapseSourceRule;
pub use copy_criteria::CopyCriteriaRule;
pub use decompose_join::DecomposeJoinRule;
pub use implement_join_strategy::ImplementJoinStrategyRule;
pub use merge_criteria::MergeCriteriaRule;
pub use merge_virtual::MergeVirtualRule;
pub use place_access::PlaceAccessRule;
pub use plan_joins::PlanJoinsRule;
pub use plan_procedures::PlanProceduresRule;
pub use plan_sorts::PlanSortsRule;
pub use plan_unions::PlanUnionsRule;
pub use push_aggregates::PushAggregatesRule;
pub use push_limit::PushLimitRule;
pub use push_select_criteria::{PushBackCriteriaRule, PushSelectCriteriaRule};
pub use raise_access::RaiseAccessRule;
pub use remove_optional_joins::RemoveOptionalJoinsRule;

static PLACE_ACCESS: PlaceAccessRule = PlaceAccessRule;
static ASSIGN_OUTPUT: AssignOutputElementsRule = AssignOutputElementsRule;
static REMOVE_OPTIONAL: RemoveOptionalJoinsRule = RemoveOptionalJoinsRule;
static DECOMPOSE_JOIN: DecomposeJoinRule = DecomposeJoinRule;
static PUSH_SELECT: PushSelectCriteriaRule = PushSelectCriteriaRule;
static PUSH_BACK: PushBackCriteriaRule = PushBackCriteriaRule;
static MERGE_VIRTUAL: MergeVirtualRule = MergeVirtualRule;
static COPY_CRITERIA: CopyCriteriaRule = CopyCriteriaRule;
static CLEAN_CRITERIA: CleanCriteriaRule = CleanCriteriaRule;
static PLAN_UNIONS: PlanUnionsRule = PlanUnionsRule;
static RAISE_ACCESS: RaiseAccessRule = RaiseAccessRule;
static PLAN_JOINS: PlanJoinsRule = PlanJoinsRule;
static CHOOSE_JOIN: ChooseJoinStrategyRule = ChooseJoinStrategyRule;
static CHOOSE_DEPENDENT: ChooseDependentRule = ChooseDependentRule;
static PUSH_AGGREGATES: PushAggregatesRule = PushAggregatesRule;
static PLAN_PROCEDURES: PlanProceduresRule = PlanProceduresRule;
static PUSH_LIMIT: PushLimitRule = PushLimitRule;
static CALCULATE_COST: CalculateCostRule = CalculateCostRule;
static IMPLEMENT_JOIN: ImplementJoinStrategyRule = ImplementJoinStrategyRule;
static MERGE_CRITERIA: MergeCriteriaRule = MergeCriteriaRule;
static PLAN_SORTS: PlanSortsRule = PlanSortsRule;
static COLLAPSE_SOURCE: CollapseSourceRule = CollapseSourceRule;

/// 规则标识到规则实例
pub fn rule_for(id: RuleId) -> &'static dyn OptimizerRule {
    match id {
        RuleId::PlaceAccess => &PLACE_ACCESS,
        RuleId::AssignOutputElements => &ASSIGN_OUTPUT,
        RuleId::RemoveOptionalJoins => &REMOVE_OPTIONAL,
        RuleId::DecomposeJoin => &DECOMPOSE_JOIN,
        RuleId::PushSelectCriteria => &PUSH_SELECT,
        RuleId::PushBackCriteria => &PUSH_BACK,
        RuleId::MergeVirtual => &MERGE_VIRTUAL,
        RuleId::CopyCriteria => &COPY_CRITERIA,
        RuleId::CleanCriteria => &CLEAN_CRITERIA,
        RuleId::PlanUnions => &PLAN_UNIONS,
        RuleId::RaiseAccess => &RAISE_ACCESS,
        RuleId::PlanJoins => &PLAN_JOINS,
        RuleId::ChooseJoinStrategy => &CHOOSE_JOIN,
        RuleId::ChooseDependent => &CHOOSE_DEPENDENT,
        RuleId::PushAggregates => &PUSH_AGGREGATES,
        RuleId::PlanProcedures => &PLAN_PROCEDURES,
        RuleId::PushLimit => &PUSH_LIMIT,
        RuleId::CalculateCost => &CALCULATE_COST,
        RuleId::ImplementJoinStrategy => &IMPLEMENT_JOIN,
        RuleId::MergeCriteria => &MERGE_CRITERIA,
        RuleId::PlanSorts => &PLAN_SORTS,
        RuleId::CollapseSource => &COLLAPSE_SOURCE,
    }
}
