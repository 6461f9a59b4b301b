#![doc = "spark-rpc: 传输无关的 RPC 分发核心。"]
#![doc = ""]
#![doc = "进程以服务名注册一组可调用方法，再以“服务名 + 调用负载”发起调用，统一得到 `{ ret, err_code, err_msg }` 结果信封。"]
#![doc = "核心不包含网络、鉴权或进程引导；传输层把收到的字节交给 [`RpcServer::call`]，并把返回的字节原样送回。"]
#![doc = ""]
#![doc = "== 错误码 =="]
#![doc = "`ServiceNotFoundError=501`、`FunctionNotFoundError=500`、`ParseJSONError=511`、`ParameterError=512`，数值为线上协议的一部分。"]

pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod method;
pub mod observability;
pub mod registry;
pub mod service;

pub use config::{ConfigError, RpcConfig};
pub use decoder::{DecodedCall, decode_call};
pub use dispatcher::{Dispatch, RpcServer};
pub use envelope::{ErrorCode, RpcResult};
pub use error::{ArgumentError, DecodeError, RegisterError};
pub use method::{ExclusiveHandler, MethodDescriptor, MethodSet, ReceiverAccess, SharedHandler};
pub use observability::ObservabilityError;
pub use registry::ServiceRegistry;
pub use service::{RpcReceiver, Service, derive_service_name, is_exported_name};

/// 分发核心常用类型的便捷导入。
pub mod prelude {
    pub use crate::{MethodSet, RpcReceiver, RpcResult, RpcServer};
}
