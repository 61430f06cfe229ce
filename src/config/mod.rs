//! 规划器配置
//!
//! 规则引擎与成本模型的可调参数，支持从 TOML 配置文件加载。
//! 库内使用编译期默认值；缺失配置文件不是错误。

use std::path::Path;

use serde::{Deserialize, Serialize};

/// 规划器与优化器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// 规则执行次数上限；规则自推导致的病态循环由此兜底
    pub max_rule_executions: usize,
    /// 依赖连接在能力未申报上限时使用的 IN 列表兜底上限
    pub default_dependent_in_limit: usize,
    /// 是否启用基于成本的依赖连接选择
    pub enable_cost_model: bool,
    /// 分析记录汇是否记录调试文本行
    pub record_debug: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_rule_executions: 10_000,
            default_dependent_in_limit: 1_000,
            enable_cost_model: true,
            record_debug: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    planner: PlannerSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlannerSection {
    max_rule_executions: Option<usize>,
    default_dependent_in_limit: Option<usize>,
    enable_cost_model: Option<bool>,
    record_debug: Option<bool>,
}

impl PlannerConfig {
    /// 从 TOML 配置文件加载，未给出的键保持默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("无法读取配置文件: {}", e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| format!("配置文件解析失败: {}", e))?;

        let mut config = PlannerConfig::default();
        if let Some(v) = file.planner.max_rule_executions {
            config.max_rule_executions = v;
        }
        if let Some(v) = file.planner.default_dependent_in_limit {
            config.default_dependent_in_limit = v;
        }
        if let Some(v) = file.planner.enable_cost_model {
            config.enable_cost_model = v;
        }
        if let Some(v) = file.planner.record_debug {
            config.record_debug = v;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.max_rule_executions, 10_000);
        assert!(config.enable_cost_model);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = PlannerConfig::from_toml_str(
            r#"
[planner]
max_rule_executions = 500
record_debug = true
"#,
        )
        .unwrap();
        assert_eq!(config.max_rule_executions, 500);
        assert!(config.record_debug);
        // 未给出的键保持默认
        assert_eq!(config.default_dependent_in_limit, 1_000);
    }

    #[test]
    fn test_empty_toml_is_defaults() {
        let config = PlannerConfig::from_toml_str("").unwrap();
        assert_eq!(config.max_rule_executions, 10_000);
    }

    #[test]
    fn test_malformed_toml_errors() {
        assert!(PlannerConfig::from_toml_str("[planner\nbad").is_err());
    }
}
