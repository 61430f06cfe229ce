//! 派生对象单飞缓存
//!
//! 行过滤器、列掩码与视图计划都是策略/元数据配置的函数，
//! 与具体查询无关，因此按目录对象身份记忆。并发编译同一对象时
//! 由 moka 保证同键只计算一次（单飞），规划器自身不再加锁。

use std::any::Any;
use std::sync::Arc;

use moka::sync::Cache;

/// 按对象身份键入的小型无类型缓存
pub struct DerivedObjectCache {
    inner: Cache<String, Arc<dyn Any + Send + Sync>>,
}

impl DerivedObjectCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::new(10_000),
        }
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            inner: Cache::new(capacity),
        }
    }

    /// 取出或计算缓存项
    ///
    /// 同一键的并发计算只会执行一次 `compute`，其余调用方阻塞等待结果。
    /// 同一键必须始终存入同一类型，否则属于编程错误。
    pub fn get_or_compute<T, F>(&self, key: &str, compute: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let entry = self
            .inner
            .get_with(key.to_string(), || -> Arc<dyn Any + Send + Sync> {
                Arc::new(compute())
            });
        entry
            .downcast::<T>()
            .expect("派生对象缓存的键被复用到了不同类型")
    }

    /// 使一个键失效（策略变更后由元数据层调用）
    pub fn invalidate(&self, key: &str) {
        self.inner.invalidate(key);
    }

    pub fn len(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DerivedObjectCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DerivedObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedObjectCache").finish_non_exhaustive()
    }
}
