use std::path::Path;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 分析服务基础URL
    pub api_base_url: String,
    /// 本地文档缓存目录
    pub cache_dir: String,
    /// 进度条推进间隔（毫秒）
    pub progress_tick_ms: u64,
    /// 每次推进的百分比
    pub progress_step: u8,
    /// 两个分析请求都结束之前，进度最多推进到的百分比
    pub progress_ceiling: u8,
    /// 处理完成后跳转到摘要页前的等待时间（毫秒）
    pub handoff_delay_ms: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            cache_dir: ".legal_lens_cache".to_string(),
            progress_tick_ms: 500,
            progress_step: 5,
            progress_ceiling: 95,
            handoff_delay_ms: 2000,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从环境变量覆盖默认配置
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载配置，缺省字段使用默认值
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config)
    }

    /// 先读配置文件（如果存在），再用环境变量覆盖
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let base = match path {
            Some(p) if p.exists() => Self::from_file(p)?,
            _ => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    fn with_env_overrides(self) -> Self {
        Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(self.api_base_url),
            cache_dir: std::env::var("CACHE_DIR").unwrap_or(self.cache_dir),
            progress_tick_ms: std::env::var("PROGRESS_TICK_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.progress_tick_ms),
            progress_step: std::env::var("PROGRESS_STEP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.progress_step),
            progress_ceiling: std::env::var("PROGRESS_CEILING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.progress_ceiling),
            handoff_delay_ms: std::env::var("HANDOFF_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.handoff_delay_ms),
            verbose_logging: std::env::var("VERBOSE_LOGGING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.verbose_logging),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_base_url = \"http://analysis.internal:9000\"").unwrap();
        writeln!(file, "handoff_delay_ms = 0").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.api_base_url, "http://analysis.internal:9000");
        assert_eq!(config.handoff_delay_ms, 0);
        assert_eq!(config.progress_step, 5);
        assert_eq!(config.cache_dir, ".legal_lens_cache");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "progress_step = \"lots\"").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Config(ConfigError::TomlParseFailed { .. })
        ));
    }
}
