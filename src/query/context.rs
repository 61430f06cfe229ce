//! 命令上下文
//!
//! 单次编译请求携带的会话状态：生效的安全策略集、缓存开关、
//! 全局临时表存储句柄，以及只升不降的确定性级别。

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::core::symbol::ElementSymbol;
use crate::query::metadata::PolicySet;

/// 结果确定性级别，顺序递增
///
/// 规划器发现策略派生逻辑影响结果时会提升该级别，从不降低。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeterminismLevel {
    Deterministic = 0,
    SessionDeterministic = 1,
    NonDeterministic = 2,
}

impl DeterminismLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => DeterminismLevel::Deterministic,
            1 => DeterminismLevel::SessionDeterministic,
            _ => DeterminismLevel::NonDeterministic,
        }
    }
}

/// 全局临时表存储句柄
///
/// 规划器只做登记查询（物化目标是否已注册），数据由运行时管理。
#[derive(Debug, Default)]
pub struct TempTableStore {
    tables: DashMap<String, Vec<ElementSymbol>>,
}

impl TempTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, columns: Vec<ElementSymbol>) {
        self.tables.insert(name.to_string(), columns);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn remove(&self, name: &str) {
        self.tables.remove(name);
    }
}

/// 单次编译请求的上下文
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub request_id: Uuid,
    pub policies: Arc<PolicySet>,
    /// 结果集缓存开关；关闭时物化重定向仍生效，NOCACHE 按命令级控制
    pub cache_enabled: bool,
    pub temp_store: Arc<TempTableStore>,
    determinism: Arc<AtomicU8>,
}

impl CommandContext {
    pub fn new(policies: PolicySet) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            policies: Arc::new(policies),
            cache_enabled: true,
            temp_store: Arc::new(TempTableStore::new()),
            determinism: Arc::new(AtomicU8::new(DeterminismLevel::Deterministic as u8)),
        }
    }

    pub fn determinism(&self) -> DeterminismLevel {
        DeterminismLevel::from_u8(self.determinism.load(Ordering::Relaxed))
    }

    /// 提升确定性级别；传入更低的级别时保持不变
    pub fn raise_determinism(&self, level: DeterminismLevel) {
        self.determinism
            .fetch_max(level as u8, Ordering::Relaxed);
    }
}

impl Default for CommandContext {
    fn default() -> Self {
        Self::new(PolicySet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism_only_raises() {
        let ctx = CommandContext::default();
        assert_eq!(ctx.determinism(), DeterminismLevel::Deterministic);

        ctx.raise_determinism(DeterminismLevel::NonDeterministic);
        assert_eq!(ctx.determinism(), DeterminismLevel::NonDeterministic);

        // 尝试降级无效
        ctx.raise_determinism(DeterminismLevel::SessionDeterministic);
        assert_eq!(ctx.determinism(), DeterminismLevel::NonDeterministic);
    }

    #[test]
    fn test_temp_store_registration() {
        let store = TempTableStore::new();
        assert!(!store.contains("mat_v1"));
        store.register("mat_v1", vec![]);
        assert!(store.contains("mat_v1"));
    }
}
