//! # config 模块说明
//!
//! ## 角色定位（Why）
//! - 承载分发核心为数不多的可调项：注册诊断、调用失败日志与默认日志过滤规则；
//! - 配置来源由宿主决定，本模块只负责 TOML 文本到 [`RpcConfig`] 的解析。
//!
//! ## 契约说明（What）
//! - 缺省字段取默认值，未知字段报错，避免拼写错误被静默忽略；
//! - 示例：
//!
//! ```toml
//! report_rejected_methods = true
//! log_call_failures = false
//! log_filter = "spark_rpc=debug"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 分发核心配置。
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RpcConfig {
    /// 注册时是否逐一记录被准入过滤器拒绝的方法。
    pub report_rejected_methods: bool,
    /// 调用失败（501/500/511/512）时是否记录 `warn` 日志。
    pub log_call_failures: bool,
    /// `RUST_LOG` 未设置时使用的默认过滤规则，见 [`crate::observability::install`]。
    pub log_filter: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            report_rejected_methods: true,
            log_call_failures: true,
            log_filter: "info".to_owned(),
        }
    }
}

/// 配置加载失败的原因。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败。
    #[error("failed to read config file `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML 文本无法解析为 [`RpcConfig`]。
    #[error("invalid rpc config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl RpcConfig {
    /// 从 TOML 文本解析配置。
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// 从 TOML 文件加载配置。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
