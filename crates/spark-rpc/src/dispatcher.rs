//! # dispatcher 模块说明
//!
//! ## 角色定位（Why）
//! - [`RpcServer`] 是传输层调用分发核心的唯一入口：`call(service, payload) -> bytes`；
//! - [`Dispatch`] 是传输层依赖的最小接口，便于以 `Arc`/测试替身注入。
//!
//! ## 行为逻辑（How）
//! 1. 共享读锁下查找服务，未命中返回 `ServiceNotFoundError(501)`；
//! 2. 解码负载，失败返回 `ParseJSONError(511)`；
//! 3. 查找函数，未命中返回 `FunctionNotFoundError(500)`；
//! 4. 严格比较参数个数，不符返回 `ParameterError(512)`；
//! 5. 绑定接收者执行方法，参数类型转换失败同样返回 `512`，否则原样返回方法自身的结果；
//! 6. 序列化信封并返回。
//!
//! ## 契约说明（What）
//! - 任何输入都只产生一个信封，核心自身的失败不会以 `Err` 或 panic 形式越过调用边界；
//! - 业务方法内部的 panic 不被捕获，会沿 `call` 继续展开，由宿主决定处理方式；
//! - 方法执行期间不持有注册表锁；核心不做排队、限流、超时与取消。

use std::sync::Arc;

use crate::config::RpcConfig;
use crate::decoder::decode_call;
use crate::envelope::{ErrorCode, RpcResult};
use crate::error::RegisterError;
use crate::registry::ServiceRegistry;
use crate::service::RpcReceiver;

/// 传输层依赖的分发接口。
///
/// 传输层负责分帧、一次调用恰好投递一个负载，并把返回的字节原样交还给远端；
/// 它不解释 `err_code`。
pub trait Dispatch: Send + Sync {
    /// 分发一次调用，始终返回一个序列化后的结果信封。
    fn dispatch(&self, service_name: &str, payload: &[u8]) -> Vec<u8>;
}

impl<T: Dispatch + ?Sized> Dispatch for Arc<T> {
    fn dispatch(&self, service_name: &str, payload: &[u8]) -> Vec<u8> {
        (**self).dispatch(service_name, payload)
    }
}

/// `RpcServer` 组合服务注册表与调用分发器。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `register*` 在启动期装配服务，失败时返回 [`RegisterError`] 且不影响已注册服务；
///   - [`call`](Self::call) 不返回错误，任意字节输入都会得到一个结果信封；
///     例外是业务方法自身 panic，核心不捕获，panic 会传播给调用方；
///   - [`call_result`](Self::call_result) 与 `call` 走同一流程，只是不做序列化，供进程内调用方使用。
/// - **执行 (How)**：注册表由 `RpcServer` 独占持有，需跨线程共享时整体放入 `Arc`。
///
/// ```
/// use spark_rpc::{MethodSet, RpcReceiver, RpcResult, RpcServer};
///
/// struct Math;
///
/// impl RpcReceiver for Math {
///     fn methods(methods: &mut MethodSet<Self>) {
///         methods.method("Add", |_: &Math, a: i64, b: i64| RpcResult::ok(a + b));
///     }
/// }
///
/// let server = RpcServer::new();
/// server.register(Math).unwrap();
/// assert_eq!(
///     server.call("Math", br#"["Add", 2, 3]"#),
///     br#"{"ret":5,"err_code":0,"err_msg":""}"#
/// );
/// ```
#[derive(Debug)]
pub struct RpcServer {
    registry: ServiceRegistry,
    log_call_failures: bool,
}

impl Default for RpcServer {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcServer {
    /// 以默认配置构造空服务端。
    pub fn new() -> Self {
        Self::with_config(&RpcConfig::default())
    }

    /// 以给定配置构造空服务端。
    pub fn with_config(config: &RpcConfig) -> Self {
        Self {
            registry: ServiceRegistry::with_diagnostics(config.report_rejected_methods),
            log_call_failures: config.log_call_failures,
        }
    }

    /// 底层服务注册表。
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// 以共享视图注册接收者，见 [`ServiceRegistry::register`]。
    pub fn register<R: RpcReceiver>(&self, receiver: R) -> Result<(), RegisterError> {
        self.registry.register(receiver)
    }

    /// 注册已被共享持有的接收者，见 [`ServiceRegistry::register_shared`]。
    pub fn register_shared<R: RpcReceiver>(&self, receiver: Arc<R>) -> Result<(), RegisterError> {
        self.registry.register_shared(receiver)
    }

    /// 以独占视图注册接收者，见 [`ServiceRegistry::register_exclusive`]。
    pub fn register_exclusive<R: RpcReceiver>(&self, receiver: R) -> Result<(), RegisterError> {
        self.registry.register_exclusive(receiver)
    }

    /// 分发一次调用并返回序列化后的结果信封。
    ///
    /// # Panics
    /// 核心自身不会 panic；被调用的业务方法若 panic，panic 原样向上传播。
    pub fn call(&self, service_name: &str, payload: &[u8]) -> Vec<u8> {
        self.call_result(service_name, payload).to_bytes()
    }

    /// 分发一次调用并返回结果信封。
    pub fn call_result(&self, service_name: &str, payload: &[u8]) -> RpcResult {
        let Some(service) = self.registry.lookup(service_name) else {
            return self.fail(
                service_name,
                ErrorCode::ServiceNotFound,
                format!("Cannot find service {service_name}"),
            );
        };

        let call = match decode_call(payload) {
            Ok(call) => call,
            Err(err) => return self.fail(service_name, err.error_code(), err.to_string()),
        };

        let Some(method) = service.method(&call.function) else {
            return self.fail(
                service_name,
                ErrorCode::FunctionNotFound,
                format!("Cannot find function {}", call.function),
            );
        };

        if method.arity() != call.arity() {
            return self.fail(
                service_name,
                ErrorCode::Parameter,
                "Parameters mismatch".to_owned(),
            );
        }

        match service.invoke(method, call.args) {
            Ok(result) => result,
            Err(err) => self.fail(
                service_name,
                err.error_code(),
                format!("Parameters mismatch: {err}"),
            ),
        }
    }

    fn fail(&self, service_name: &str, code: ErrorCode, message: String) -> RpcResult {
        if self.log_call_failures {
            tracing::warn!(
                service = service_name,
                err_code = code.code(),
                "{message}"
            );
        }
        RpcResult::from_code(code, message)
    }
}

impl Dispatch for RpcServer {
    fn dispatch(&self, service_name: &str, payload: &[u8]) -> Vec<u8> {
        self.call(service_name, payload)
    }
}
