//! # envelope 模块说明
//!
//! ## 角色定位
//! - 定义每次调用唯一的输出形态 [`RpcResult`]：`{ ret, err_code, err_msg }`；
//! - 定义分发核心自身使用的封闭错误码集合 [`ErrorCode`]，数值需与线上对端保持一致。
//!
//! ## 契约说明（What）
//! - 序列化字段顺序固定为 `ret`、`err_code`、`err_msg`；
//! - `err_code == 0` 表示成功仅是约定，核心不会校验业务方法自行返回的错误码。

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 分发核心产生的封闭错误码集合。
///
/// # 契约说明（What）
/// - 数值为线上协议的一部分，禁止调整：`FunctionNotFound=500`、`ServiceNotFound=501`、
///   `ParseJson=511`、`Parameter=512`；
/// - 业务方法可以返回任意其它错误码，这些错误码不属于本枚举。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// 服务中不存在请求的函数名。
    FunctionNotFound = 500,
    /// 注册表中不存在请求的服务名。
    ServiceNotFound = 501,
    /// 调用负载无法解析，或顶层形态不是“首元素为字符串的非空数组”。
    ParseJson = 511,
    /// 参数个数与方法声明不符，或参数无法转换为方法期望的类型。
    Parameter = 512,
}

impl ErrorCode {
    /// 返回线上使用的整数值。
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::FunctionNotFound => "FunctionNotFoundError",
            ErrorCode::ServiceNotFound => "ServiceNotFoundError",
            ErrorCode::ParseJson => "ParseJSONError",
            ErrorCode::Parameter => "ParameterError",
        };
        write!(f, "{name}({})", self.code())
    }
}

impl TryFrom<i32> for ErrorCode {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            500 => Ok(ErrorCode::FunctionNotFound),
            501 => Ok(ErrorCode::ServiceNotFound),
            511 => Ok(ErrorCode::ParseJson),
            512 => Ok(ErrorCode::Parameter),
            other => Err(other),
        }
    }
}

/// `RpcResult` 是所有调用路径的统一结果信封。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - 每次 `call` 恰好产生一个信封，无论在哪个阶段失败；
///   - 方法准入过滤器以该类型做名义匹配：只有返回值类型恰为 `RpcResult` 的方法才可被分发，
///     字段完全相同但名称不同的结构体不满足要求；
///   - 分发核心对业务方法返回的信封不做任何改写。
/// - **执行 (How)**：`ret` 使用 [`serde_json::Value`] 承载任意成功负载，失败时为 `null`。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResult {
    /// 成功负载，对核心不透明。
    pub ret: Value,
    /// 错误码，`0` 表示成功（约定）。
    pub err_code: i32,
    /// 人类可读的错误描述，成功时为空串。
    pub err_msg: String,
}

impl RpcResult {
    /// 构造成功信封。
    pub fn ok(ret: impl Into<Value>) -> Self {
        Self {
            ret: ret.into(),
            err_code: 0,
            err_msg: String::new(),
        }
    }

    /// 将任意可序列化的值转换为 `ret` 后构造成功信封。
    pub fn ok_serialized<T>(ret: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        Ok(Self::ok(serde_json::to_value(ret)?))
    }

    /// 以任意错误码构造失败信封，`ret` 固定为 `null`。
    pub fn error(err_code: i32, err_msg: impl Into<String>) -> Self {
        Self {
            ret: Value::Null,
            err_code,
            err_msg: err_msg.into(),
        }
    }

    /// 以核心错误码构造失败信封。
    pub fn from_code(code: ErrorCode, err_msg: impl Into<String>) -> Self {
        Self::error(code.code(), err_msg)
    }

    /// 按约定判断是否成功（`err_code == 0`）。
    pub fn is_success(&self) -> bool {
        self.err_code == 0
    }

    /// 序列化为响应字节。
    ///
    /// 仅包含 `Value`、整数与字符串，序列化不会失败；若底层仍返回错误，
    /// 退化为一个手写的 `ParseJSONError` 信封，保证调用边界上始终有字节可返回。
    pub fn to_bytes(&self) -> Vec<u8> {
        match serde_json::to_vec(self) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize result envelope");
                FALLBACK_ENVELOPE.as_bytes().to_vec()
            }
        }
    }
}

const FALLBACK_ENVELOPE: &str =
    r#"{"ret":null,"err_code":511,"err_msg":"Failed to serialize result"}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_matches_wire_layout() {
        let bytes = RpcResult::ok(5).to_bytes();
        assert_eq!(bytes, br#"{"ret":5,"err_code":0,"err_msg":""}"#);
    }

    #[test]
    fn failure_envelope_carries_null_ret() {
        let result = RpcResult::from_code(ErrorCode::FunctionNotFound, "Cannot find function add");
        assert_eq!(
            result.to_bytes(),
            br#"{"ret":null,"err_code":500,"err_msg":"Cannot find function add"}"#
        );
        assert_eq!(
            ErrorCode::try_from(result.err_code),
            Ok(ErrorCode::FunctionNotFound)
        );
        assert!(!result.is_success());
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ErrorCode::ServiceNotFound.code(), 501);
        assert_eq!(ErrorCode::FunctionNotFound.code(), 500);
        assert_eq!(ErrorCode::ParseJson.code(), 511);
        assert_eq!(ErrorCode::Parameter.code(), 512);
        assert_eq!(ErrorCode::try_from(512), Ok(ErrorCode::Parameter));
        assert_eq!(ErrorCode::try_from(404), Err(404));
        assert_eq!(ErrorCode::ParseJson.to_string(), "ParseJSONError(511)");
    }

    #[test]
    fn business_codes_are_not_core_codes() {
        let result = RpcResult::error(42, "quota exceeded");
        assert_eq!(ErrorCode::try_from(result.err_code), Err(42));
        assert_eq!(result.ret, Value::Null);
    }

    #[test]
    fn serialized_payload_lands_in_ret() {
        #[derive(Serialize)]
        struct Point {
            x: i32,
            y: i32,
        }

        let result = RpcResult::ok_serialized(&Point { x: 1, y: 2 }).unwrap();
        assert_eq!(result.ret, json!({ "x": 1, "y": 2 }));
        assert!(result.is_success());
    }

    #[test]
    fn envelope_parses_back_from_peer_bytes() {
        let parsed: RpcResult =
            serde_json::from_slice(br#"{"ret":[1,"a"],"err_code":7,"err_msg":"x"}"#).unwrap();
        assert_eq!(parsed, RpcResult {
            ret: json!([1, "a"]),
            err_code: 7,
            err_msg: "x".to_owned(),
        });
    }
}
