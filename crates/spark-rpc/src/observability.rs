//! 日志安装入口。
//!
//! 分发核心只通过 `tracing` 发出事件，不拥有日志落地策略。宿主若没有自己的 Subscriber，
//! 可调用 [`install`] 装配 `fmt + EnvFilter`：`RUST_LOG` 优先，其次是
//! [`RpcConfig::log_filter`](crate::RpcConfig::log_filter)。

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

use crate::config::RpcConfig;

/// 日志安装失败的原因。
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// 配置中的过滤规则无法解析。
    #[error("invalid log filter `{filter}`: {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: ParseError,
    },

    /// 全局 Subscriber 已被设置，或装配失败。
    #[error("failed to install global tracing subscriber: {0}")]
    Install(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// 构造过滤器：`RUST_LOG` 存在且合法时优先使用，否则解析配置中的默认规则。
pub fn env_filter(config: &RpcConfig) -> Result<EnvFilter, ObservabilityError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_filter).map_err(|source| ObservabilityError::InvalidFilter {
        filter: config.log_filter.clone(),
        source,
    })
}

/// 安装全局 `fmt` Subscriber，进程内只能成功一次。
pub fn install(config: &RpcConfig) -> Result<(), ObservabilityError> {
    let filter = env_filter(config)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(ObservabilityError::Install)
}
