//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义分发核心在“调用信封之外”暴露的错误语义：注册期错误、调用解码错误与参数转换错误；
//! - 调用期错误最终都会折叠为 [`RpcResult`](crate::RpcResult) 中的错误码，本模块的类型只在核心内部
//!   或注册调用方处可见。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，可直接接入 `std::error::Error` 生态；
//! - [`DecodeError`] 与 [`ArgumentError`] 分别提供到核心错误码的映射，保证失败分类稳定。

use thiserror::Error;

use crate::envelope::ErrorCode;

/// 服务注册失败的原因。
///
/// # 契约说明（What）
/// - 注册失败时注册表保持不变，不存在部分注册；
/// - 这些错误发生在任何调用之前，因此不使用信封错误码。
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum RegisterError {
    /// 同名服务已注册。
    #[error("service already defined: {name}")]
    DuplicateService { name: String },

    /// 接收者类型没有可用的名义类型名（元组、引用、闭包等）。
    #[error("no service name for type {type_name}")]
    UnnamedType { type_name: &'static str },

    /// 类型名首字符不是大写，不满足导出规则。
    #[error("type {name} is not exported")]
    NotExported { name: String },

    /// 接收者没有任何满足准入规则的方法。
    ///
    /// `hint` 为真表示若以独占视图注册（`register_exclusive`），会有方法被准入。
    #[error(
        "type {name} has no exported methods of suitable type{}",
        hint_suffix(.hint)
    )]
    NoSuitableMethods { name: String, hint: bool },
}

fn hint_suffix(hint: &bool) -> &'static str {
    if *hint {
        " (hint: register the receiver for exclusive access)"
    } else {
        ""
    }
}

/// 调用负载解码失败的原因，统一映射为 [`ErrorCode::ParseJson`]。
#[derive(Debug, Error)]
pub enum DecodeError {
    /// 负载不是合法 JSON。
    #[error("Failed to parse call string:{0}")]
    Malformed(#[from] serde_json::Error),

    /// 顶层不是数组。
    #[error("Invalid call string format")]
    NotAnArray,

    /// 顶层数组为空，缺少函数名。
    #[error("Invalid call string format")]
    EmptyCall,

    /// 首元素不是字符串。
    #[error("Invalid call string format")]
    FunctionNameNotString,
}

impl DecodeError {
    /// 对应的信封错误码。
    pub const fn error_code(&self) -> ErrorCode {
        ErrorCode::ParseJson
    }
}

/// 位置参数向具体类型转换失败的原因，统一映射为 [`ErrorCode::Parameter`]。
#[derive(Debug, Error)]
pub enum ArgumentError {
    /// 第 `index` 个参数缺失（从 0 开始计数，不含函数名）。
    #[error("argument {index} is missing")]
    Missing { index: usize },

    /// 第 `index` 个参数无法转换为目标类型。
    #[error("argument {index} has unexpected type: {source}")]
    Invalid {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl ArgumentError {
    /// 对应的信封错误码。
    pub const fn error_code(&self) -> ErrorCode {
        ErrorCode::Parameter
    }
}
