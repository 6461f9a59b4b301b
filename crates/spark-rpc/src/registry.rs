//! # registry 模块说明
//!
//! ## 角色定位（Why）
//! - `ServiceRegistry` 维护“服务名 → [`Service`]”映射，是注册路径与调用路径共享的唯一状态；
//! - 注册独占写锁，查询共享读锁；查询只在克隆 `Arc<Service>` 期间持锁，方法执行不占用注册表锁。
//!
//! ## 契约说明（What）
//! - 服务名在注册表生命周期内唯一，不提供注销与替换；
//! - 注册失败时注册表保持不变，并输出一条 `warn` 日志描述失败原因；
//! - 并发注册同名服务时只有一个成功，其余观察到 [`RegisterError::DuplicateService`]。

use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::RegisterError;
use crate::method::{MethodSet, ReceiverAccess, ReceiverCell, count_suitable, suitable_methods};
use crate::service::{RpcReceiver, Service, is_exported_name};

/// `ServiceRegistry` 是线程安全的服务注册表。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - [`register`](Self::register) 以共享视图注册接收者，只准入 `&self` 方法；
///   - [`register_exclusive`](Self::register_exclusive) 以独占视图注册，`&self` 与 `&mut self`
///     方法均可准入，方法执行期间持有接收者互斥锁；
///   - [`lookup`](Self::lookup) 返回的 `Arc<Service>` 在释放读锁后仍然有效。
/// - **执行 (How)**：
///   1. 获取写锁，推导服务名并依次检查空名、导出规则与重名；
///   2. 运行方法准入过滤器，`report_diagnostics` 决定是否记录被拒方法；
///   3. 函数表为空时，静默以独占视图重跑过滤器，仅用于生成提示；
///   4. 插入服务并释放写锁。
#[derive(Debug)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<Service>>>,
    report_diagnostics: bool,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    /// 构造空注册表，默认记录被拒方法的诊断日志。
    pub fn new() -> Self {
        Self::with_diagnostics(true)
    }

    /// 构造空注册表，并指定是否记录被拒方法的诊断日志。
    pub fn with_diagnostics(report_diagnostics: bool) -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            report_diagnostics,
        }
    }

    /// 以共享视图注册接收者。
    pub fn register<R: RpcReceiver>(&self, receiver: R) -> Result<(), RegisterError> {
        self.register_shared(Arc::new(receiver))
    }

    /// 以共享视图注册已被共享持有的接收者。
    pub fn register_shared<R: RpcReceiver>(&self, receiver: Arc<R>) -> Result<(), RegisterError> {
        self.install(ReceiverCell::Shared(receiver))
    }

    /// 以独占视图注册接收者，`&mut self` 方法随之可达。
    pub fn register_exclusive<R: RpcReceiver>(&self, receiver: R) -> Result<(), RegisterError> {
        self.install(ReceiverCell::Exclusive(Arc::new(Mutex::new(receiver))))
    }

    fn install<R: RpcReceiver>(&self, cell: ReceiverCell<R>) -> Result<(), RegisterError> {
        let mut services = self.services.write();

        let name = R::service_name();
        if name.is_empty() {
            let err = RegisterError::UnnamedType {
                type_name: type_name::<R>(),
            };
            return rejected::<R>(err);
        }
        if !is_exported_name(&name) {
            let err = RegisterError::NotExported {
                name: name.into_owned(),
            };
            return rejected::<R>(err);
        }
        if services.contains_key(&*name) {
            let err = RegisterError::DuplicateService {
                name: name.into_owned(),
            };
            return rejected::<R>(err);
        }

        let mut methods = MethodSet::new();
        R::methods(&mut methods);
        let table = suitable_methods(&methods, &cell, self.report_diagnostics);

        if table.is_empty() {
            let hint = cell.access() == ReceiverAccess::Shared
                && count_suitable(&methods, ReceiverAccess::Exclusive) > 0;
            let err = RegisterError::NoSuitableMethods {
                name: name.into_owned(),
                hint,
            };
            return rejected::<R>(err);
        }

        tracing::info!(
            service = %name,
            access = %cell.access(),
            methods = table.len(),
            "service registered"
        );
        let name = name.into_owned();
        let service = Service::new(name.clone(), type_name::<R>(), table);
        services.insert(name, Arc::new(service));
        Ok(())
    }

    /// 查找服务；读锁仅在克隆期间持有。
    pub fn lookup(&self, name: &str) -> Option<Arc<Service>> {
        self.services.read().get(name).cloned()
    }

    /// 是否已注册指定服务。
    pub fn contains(&self, name: &str) -> bool {
        self.services.read().contains_key(name)
    }

    /// 已注册服务名，按字典序排列。
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// 已注册服务个数。
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// 是否尚未注册任何服务。
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

fn rejected<R>(err: RegisterError) -> Result<(), RegisterError> {
    tracing::warn!(receiver = type_name::<R>(), "service registration rejected: {err}");
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::RpcResult;
    use std::borrow::Cow;
    use std::thread;
    use tracing_test::traced_test;

    struct Math;

    impl Math {
        fn add(&self, a: i64, b: i64) -> RpcResult {
            RpcResult::ok(a + b)
        }
    }

    impl RpcReceiver for Math {
        fn methods(methods: &mut MethodSet<Self>) {
            methods.method("Add", Math::add);
        }
    }

    /// 与 `Math` 同名，但声明了另一组方法。
    mod shadow {
        use super::*;

        pub(super) struct Math;

        impl RpcReceiver for Math {
            fn methods(methods: &mut MethodSet<Self>) {
                methods.method("Sub", |_: &Math, a: i64, b: i64| RpcResult::ok(a - b));
            }
        }
    }

    #[allow(non_camel_case_types)]
    struct lowercase;

    impl RpcReceiver for lowercase {
        fn methods(methods: &mut MethodSet<Self>) {
            methods.method("Ping", |_: &lowercase| RpcResult::ok("pong"));
        }
    }

    struct Anonymous;

    impl RpcReceiver for Anonymous {
        fn methods(methods: &mut MethodSet<Self>) {
            methods.method("Ping", |_: &Anonymous| RpcResult::ok("pong"));
        }

        fn service_name() -> Cow<'static, str> {
            Cow::Borrowed("")
        }
    }

    #[derive(Default)]
    struct Counter {
        value: i64,
    }

    impl RpcReceiver for Counter {
        fn methods(methods: &mut MethodSet<Self>) {
            methods.method_mut("Incr", |counter: &mut Counter| {
                counter.value += 1;
                RpcResult::ok(counter.value)
            });
        }
    }

    struct Hollow;

    impl RpcReceiver for Hollow {
        fn methods(methods: &mut MethodSet<Self>) {
            methods.method("Count", |_: &Hollow| 3_i64);
        }
    }

    #[test]
    fn registers_and_looks_up_services() {
        let registry = ServiceRegistry::new();
        assert!(registry.is_empty());
        registry.register(Math).unwrap();

        let service = registry.lookup("Math").unwrap();
        assert_eq!(service.name(), "Math");
        assert!(service.receiver_type().ends_with("Math"));
        assert_eq!(service.method_names().collect::<Vec<_>>(), ["Add"]);
        assert!(registry.contains("Math"));
        assert_eq!(registry.service_names(), ["Math"]);
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("Unknown").is_none());
    }

    #[test]
    fn duplicate_name_keeps_original_table() {
        let registry = ServiceRegistry::new();
        registry.register(Math).unwrap();

        let err = registry.register(shadow::Math).unwrap_err();
        assert_eq!(err, RegisterError::DuplicateService {
            name: "Math".to_owned()
        });

        let service = registry.lookup("Math").unwrap();
        assert!(service.method("Add").is_some());
        assert!(service.method("Sub").is_none());
    }

    #[test]
    fn naming_rules_reject_before_admission() {
        let registry = ServiceRegistry::new();
        assert_eq!(
            registry.register(lowercase).unwrap_err(),
            RegisterError::NotExported {
                name: "lowercase".to_owned()
            }
        );
        assert!(matches!(
            registry.register(Anonymous).unwrap_err(),
            RegisterError::UnnamedType { type_name } if type_name.ends_with("Anonymous")
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn shared_view_hints_at_exclusive_registration() {
        let registry = ServiceRegistry::new();
        assert_eq!(
            registry.register(Counter::default()).unwrap_err(),
            RegisterError::NoSuitableMethods {
                name: "Counter".to_owned(),
                hint: true,
            }
        );
        assert!(!registry.contains("Counter"));

        registry.register_exclusive(Counter::default()).unwrap();
        let service = registry.lookup("Counter").unwrap();
        let incr = service.method("Incr").unwrap();
        assert_eq!(incr.access(), ReceiverAccess::Exclusive);
        service.invoke(incr, Vec::new()).unwrap();
        assert_eq!(service.invoke(incr, Vec::new()).unwrap(), RpcResult::ok(2));
    }

    #[test]
    fn no_hint_when_nothing_is_admissible() {
        let registry = ServiceRegistry::with_diagnostics(false);
        assert_eq!(
            registry.register(Hollow).unwrap_err(),
            RegisterError::NoSuitableMethods {
                name: "Hollow".to_owned(),
                hint: false,
            }
        );
    }

    #[test]
    fn shared_receivers_can_be_registered_by_arc() {
        let registry = ServiceRegistry::new();
        let math = Arc::new(Math);
        registry.register_shared(Arc::clone(&math)).unwrap();
        assert_eq!(Arc::strong_count(&math), 2);
    }

    #[test]
    fn concurrent_duplicate_registration_admits_exactly_one() {
        let registry = Arc::new(ServiceRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.register(Math).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(registry.len(), 1);
    }

    #[traced_test]
    #[test]
    fn every_failure_path_is_logged() {
        let registry = ServiceRegistry::new();
        registry.register(Math).unwrap();
        let _ = registry.register(Math);
        let _ = registry.register(lowercase);
        let _ = registry.register(Hollow);

        assert!(logs_contain("service registered"));
        assert!(logs_contain("service already defined: Math"));
        assert!(logs_contain("type lowercase is not exported"));
        assert!(logs_contain("type Hollow has no exported methods of suitable type"));
        assert!(logs_contain("method Count returns i64"));
    }
}
