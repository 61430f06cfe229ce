//! 编译期错误类型
//!
//! 按错误种类分层：规划器结构错误、元数据错误、处理/校验错误，
//! 以及包装外部协作者故障的组件错误。所有错误都会中止本次编译，
//! 子系统内不存在任何重试路径。

use thiserror::Error;

/// 规划器结构错误：不支持的计划形态或内部不变量被破坏
///
/// 始终是致命错误，表示规划器自身的缺陷而非用户输入问题。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    #[error("不支持的命令形态: {0}")]
    UnsupportedCommand(String),

    #[error("计划树不变量被破坏: {0}")]
    InvariantViolation(String),

    #[error("未知的计划节点类型: {0}")]
    UnknownNodeType(String),

    #[error("规则执行次数超过上限 {0}")]
    RuleCeiling(usize),
}

/// 元数据错误：目录查找失败或元数据格式损坏
///
/// 原样向调用方传播。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    #[error("找不到组: {0}")]
    GroupNotFound(String),

    #[error("找不到列: {0}")]
    ElementNotFound(String),

    #[error("元数据损坏: {0}")]
    Malformed(String),
}

/// 处理/校验错误：携带面向用户的具体诊断信息
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("行级安全过滤器在编译期判定为不成立: {0}")]
    FilterNotSatisfied(String),

    #[error("变更命令无法下推且没有可用的回退执行方式: {0}")]
    UnpushableMutation(String),

    #[error("安全策略表达式未通过语义校验: {0}")]
    PolicyValidation(String),
}

/// 编译顶层错误，聚合所有错误种类
#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("协作组件故障: {0}")]
    Component(String),
}

pub type CompileResult<T> = Result<T, CompileError>;

impl CompileError {
    /// 包装外部协作者抛出的意外故障
    pub fn component<E: std::error::Error>(e: E) -> Self {
        CompileError::Component(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_convert() {
        let e: CompileError = PlannerError::RuleCeiling(10).into();
        assert!(matches!(e, CompileError::Planner(_)));

        let e: CompileError = MetadataError::GroupNotFound("pm1.g1".into()).into();
        assert!(matches!(e, CompileError::Metadata(_)));

        let e: CompileError = ProcessingError::FilterNotSatisfied("t.a = 1".into()).into();
        assert!(matches!(e, CompileError::Processing(_)));
    }

    #[test]
    fn test_processing_error_is_user_facing() {
        let e = ProcessingError::UnpushableMutation("pm1.g1 缺少唯一键".into());
        assert!(e.to_string().contains("pm1.g1"));
    }
}
