//! 分析记录汇
//!
//! 只写不读的诊断出口：调试文本行与结构化注记。
//! 咨询性状况（未匹配的依赖提示、被 NOCACHE 绕过的物化视图、
//! 无法下推的 WITH 列表）都记在这里，从不升级为错误。

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// 注记严重程度（仅用于展示排序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// 结构化注记
#[derive(Debug, Clone, Serialize)]
pub struct Annotation {
    pub category: String,
    pub message: String,
    pub resolution: Option<String>,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl Annotation {
    pub fn new(category: &str, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            category: category.to_string(),
            message: message.into(),
            resolution: None,
            severity,
            timestamp: Utc::now(),
        }
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }
}

#[derive(Debug, Default)]
struct Inner {
    lines: Vec<String>,
    annotations: Vec<Annotation>,
}

/// 分析记录汇；内部可变，供规划各组件并发追加
#[derive(Debug, Default)]
pub struct AnalysisRecord {
    record_debug: bool,
    inner: Mutex<Inner>,
}

impl AnalysisRecord {
    pub fn new(record_debug: bool) -> Self {
        Self {
            record_debug,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// 是否记录调试文本行
    pub fn records_debug(&self) -> bool {
        self.record_debug
    }

    pub fn record_line(&self, line: impl Into<String>) {
        if !self.record_debug {
            return;
        }
        self.inner.lock().lines.push(line.into());
    }

    pub fn annotate(&self, annotation: Annotation) {
        log::debug!("规划注记 [{}]: {}", annotation.category, annotation.message);
        self.inner.lock().annotations.push(annotation);
    }

    /// 注记快照（供调用方与测试读取）
    pub fn annotations(&self) -> Vec<Annotation> {
        self.inner.lock().annotations.clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.inner.lock().lines.clone()
    }

    /// 渲染为 JSON，调试输出用
    pub fn to_json(&self) -> serde_json::Value {
        let inner = self.inner.lock();
        serde_json::json!({
            "lines": inner.lines,
            "annotations": inner.annotations,
        })
    }
}
