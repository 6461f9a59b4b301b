//! # service 模块说明
//!
//! ## 角色定位（Why）
//! - [`RpcReceiver`] 是业务类型接入分发核心的唯一契约：声明服务名来源与候选方法集合；
//! - [`Service`] 是注册成功后的不可变快照：服务名、接收者类型名与已准入的函数表。
//!
//! ## 服务名规则（What）
//! - 默认取接收者类型名的最后一段路径并去掉泛型参数，例如 `my_app::api::Math<u8>` 得到 `Math`；
//! - 元组、引用、切片、数组、指针、闭包等没有名义类型名的类型得到空名，注册时被拒绝；
//! - 首字符必须为大写（导出规则）。
//! - 推导基于 `std::any::type_name`，其输出格式不受稳定性保证；需要固定服务名的接收者应覆盖
//!   [`RpcReceiver::service_name`]。

use std::any::type_name;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::envelope::RpcResult;
use crate::error::ArgumentError;
use crate::method::{MethodDescriptor, MethodSet};

/// 可注册为 RPC 服务的接收者。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `methods` 声明全部候选方法，是否可分发由准入过滤器决定；
///   - `service_name` 默认由类型名推导，覆盖实现时同样需要满足非空与导出规则；
///   - 接收者需满足 `Send + Sync + 'static`，注册后由注册表在进程生命周期内持有。
/// - **执行 (How)**：注册表在持有写锁期间调用 `service_name` 与 `methods`，二者不应阻塞。
pub trait RpcReceiver: Send + Sync + Sized + 'static {
    /// 声明候选方法。
    fn methods(methods: &mut MethodSet<Self>);

    /// 服务名，默认取自接收者类型名。
    fn service_name() -> Cow<'static, str> {
        Cow::Borrowed(derive_service_name(type_name::<Self>()))
    }
}

/// 从 `std::any::type_name` 的输出推导服务名；非名义类型返回空串。
pub fn derive_service_name(type_name: &str) -> &str {
    if type_name.starts_with(['(', '[', '&', '*'])
        || type_name.starts_with("dyn ")
        || type_name.starts_with("fn(")
        || type_name.starts_with("impl ")
        || type_name.contains("{{")
    {
        return "";
    }

    let path = match type_name.find('<') {
        Some(generics) => &type_name[..generics],
        None => type_name,
    };
    path.rsplit("::").next().unwrap_or_default()
}

/// 服务名是否满足导出规则：首字符为大写。
pub fn is_exported_name(name: &str) -> bool {
    crate::method::is_exported(name)
}

/// 已注册的服务。
///
/// 函数表在注册完成后不可变；接收者由各描述符中的闭包共同持有。
pub struct Service {
    name: String,
    receiver_type: &'static str,
    methods: BTreeMap<String, MethodDescriptor>,
}

impl Service {
    pub(crate) fn new(
        name: String,
        receiver_type: &'static str,
        methods: BTreeMap<String, MethodDescriptor>,
    ) -> Self {
        Self {
            name,
            receiver_type,
            methods,
        }
    }

    /// 服务名。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 接收者的完整类型名，便于诊断。
    pub fn receiver_type(&self) -> &'static str {
        self.receiver_type
    }

    /// 按函数名查找已准入的方法。
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    /// 已准入方法名，按字典序排列。
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// 已准入方法个数。
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// 是否没有已准入方法（注册成功的服务恒为 `false`）。
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub(crate) fn invoke(
        &self,
        method: &MethodDescriptor,
        args: Vec<Value>,
    ) -> Result<RpcResult, ArgumentError> {
        tracing::trace!(service = %self.name, method = method.name(), "invoking method");
        method.invoke(args)
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("receiver_type", &self.receiver_type)
            .field("methods", &self.methods.values().collect::<Vec<_>>())
            .finish()
    }
}
