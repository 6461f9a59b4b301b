//! # method 模块说明
//!
//! ## 角色定位（Why）
//! - 以“注册期构建”替代运行期反射：接收者在 [`RpcReceiver::methods`](crate::RpcReceiver::methods)
//!   中把每个方法声明为 [`MethodSet`] 中的一个候选项，候选项内部保存类型擦除后的处理闭包；
//! - 方法准入过滤器在注册时遍历候选项，只有“恰好返回一个 [`RpcResult`]”的方法才会进入可分发表。
//!
//! ## 行为逻辑（How）
//! 1. `method`/`method_mut` 将 `Fn(&R, A1..An) -> O` 适配为 `Fn(&R, Vec<Value>) -> Result<O, _>`，
//!    并记录参数个数与返回值形态 `OutputShape`；
//! 2. [`suitable_methods`] 依次检查接收者视图、导出规则、返回值个数与返回值类型；
//! 3. 通过检查的候选项以类型化向下转型绑定到接收者，得到 [`MethodDescriptor`]。
//!    向下转型只可能对返回 `RpcResult` 的闭包成功，因此分发路径不存在运行期类型失败。
//!
//! ## 契约说明（What）
//! - 返回值匹配是名义匹配（`TypeId` 相等），结构相同但名称不同的类型一律拒绝；
//! - 参数类型不在注册期校验，调用期由各闭包通过 `serde` 转换，失败时报告 [`ArgumentError`]。
//! - 返回值个数由 `std::any::type_name` 的输出推导。该输出只保证“尽力而为”，不同编译器版本可能
//!   改变格式，因此它只影响拒绝原因的诊断分类；准入与绑定只依赖 `TypeId`，不受其影响。

use std::any::{Any, TypeId, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::envelope::RpcResult;
use crate::error::ArgumentError;

/// 共享视图下的类型化处理闭包。
pub type SharedFn<R, O> =
    Arc<dyn Fn(&R, Vec<Value>) -> Result<O, ArgumentError> + Send + Sync>;

/// 独占视图下的类型化处理闭包。
pub type ExclusiveFn<R, O> =
    Arc<dyn Fn(&mut R, Vec<Value>) -> Result<O, ArgumentError> + Send + Sync>;

/// 已绑定接收者的调用入口，签名固定为 `(args) -> RpcResult`。
type Invoker = Arc<dyn Fn(Vec<Value>) -> Result<RpcResult, ArgumentError> + Send + Sync>;

/// 方法对接收者的访问方式。
///
/// - `Shared`：方法以 `&self` 声明，任何注册方式均可达；
/// - `Exclusive`：方法以 `&mut self` 声明，仅当接收者通过
///   [`register_exclusive`](crate::ServiceRegistry::register_exclusive) 注册时可达。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ReceiverAccess {
    Shared,
    Exclusive,
}

impl fmt::Display for ReceiverAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverAccess::Shared => f.write_str("shared"),
            ReceiverAccess::Exclusive => f.write_str("exclusive"),
        }
    }
}

/// 接收者在注册表中的存放形态。
pub(crate) enum ReceiverCell<R> {
    Shared(Arc<R>),
    Exclusive(Arc<Mutex<R>>),
}

impl<R> ReceiverCell<R> {
    pub(crate) fn access(&self) -> ReceiverAccess {
        match self {
            ReceiverCell::Shared(_) => ReceiverAccess::Shared,
            ReceiverCell::Exclusive(_) => ReceiverAccess::Exclusive,
        }
    }
}

/// 候选方法声明的返回值形态。
///
/// # 契约说明（What）
/// - `arity`：返回值个数，`()` 计为 0，n 元组计为 n，其余类型计为 1；
/// - `is_result`：返回值类型是否恰为 [`RpcResult`]（`TypeId` 名义比较）。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct OutputShape {
    type_id: TypeId,
    type_name: &'static str,
    arity: usize,
}

impl OutputShape {
    /// 读取类型 `O` 的返回值形态。
    pub(crate) fn of<O: 'static>() -> Self {
        let type_name = type_name::<O>();
        Self {
            type_id: TypeId::of::<O>(),
            type_name,
            arity: output_arity(type_name),
        }
    }

    /// 是否恰为规范结果类型。
    pub(crate) fn is_result(&self) -> bool {
        self.type_id == TypeId::of::<RpcResult>()
    }
}

/// 由类型名推导返回值个数：只在顶层逗号处分割元组。
fn output_arity(type_name: &str) -> usize {
    if type_name == "()" {
        return 0;
    }
    let Some(inner) = type_name
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        return 1;
    };

    let mut depth = 0usize;
    let mut commas = 0usize;
    for ch in inner.chars() {
        match ch {
            '(' | '<' | '[' => depth += 1,
            ')' | '>' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => commas += 1,
            _ => {}
        }
    }
    // 单元素元组渲染为 `(T,)`。
    if inner.trim_end().ends_with(',') {
        commas
    } else {
        commas + 1
    }
}

/// 方法名是否导出：非空且首字符为大写。
pub(crate) fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// 按位置依次取出并转换调用参数。
struct PositionalArgs {
    inner: std::vec::IntoIter<Value>,
    index: usize,
}

impl PositionalArgs {
    fn new(args: Vec<Value>) -> Self {
        Self {
            inner: args.into_iter(),
            index: 0,
        }
    }

    fn take<T: DeserializeOwned>(&mut self) -> Result<T, ArgumentError> {
        let index = self.index;
        self.index += 1;
        let value = self.inner.next().ok_or(ArgumentError::Missing { index })?;
        serde_json::from_value(value).map_err(|source| ArgumentError::Invalid { index, source })
    }
}

/// 可作为共享视图方法注册的函数：`Fn(&R, A1, .., An) -> O`。
///
/// `Args` 仅用于区分不同参数个数的实现，调用方无需显式书写。
pub trait SharedHandler<R, Args>: Send + Sync + 'static {
    /// 声明的返回值类型。
    type Output: 'static;
    /// 声明的参数个数（不含接收者）。
    const ARITY: usize;

    #[doc(hidden)]
    fn into_shared_fn(self) -> SharedFn<R, Self::Output>;
}

/// 可作为独占视图方法注册的函数：`Fn(&mut R, A1, .., An) -> O`。
pub trait ExclusiveHandler<R, Args>: Send + Sync + 'static {
    /// 声明的返回值类型。
    type Output: 'static;
    /// 声明的参数个数（不含接收者）。
    const ARITY: usize;

    #[doc(hidden)]
    fn into_exclusive_fn(self) -> ExclusiveFn<R, Self::Output>;
}

macro_rules! impl_handlers {
    ($arity:expr; $($arg:ident),*) => {
        impl<R, F, O, $($arg,)*> SharedHandler<R, ($($arg,)*)> for F
        where
            R: 'static,
            O: 'static,
            F: Fn(&R, $($arg),*) -> O + Send + Sync + 'static,
            $($arg: DeserializeOwned + 'static,)*
        {
            type Output = O;
            const ARITY: usize = $arity;

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_shared_fn(self) -> SharedFn<R, O> {
                Arc::new(move |receiver: &R, args: Vec<Value>| {
                    let mut args = PositionalArgs::new(args);
                    $(let $arg = args.take::<$arg>()?;)*
                    Ok(self(receiver, $($arg),*))
                })
            }
        }

        impl<R, F, O, $($arg,)*> ExclusiveHandler<R, ($($arg,)*)> for F
        where
            R: 'static,
            O: 'static,
            F: Fn(&mut R, $($arg),*) -> O + Send + Sync + 'static,
            $($arg: DeserializeOwned + 'static,)*
        {
            type Output = O;
            const ARITY: usize = $arity;

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_exclusive_fn(self) -> ExclusiveFn<R, O> {
                Arc::new(move |receiver: &mut R, args: Vec<Value>| {
                    let mut args = PositionalArgs::new(args);
                    $(let $arg = args.take::<$arg>()?;)*
                    Ok(self(receiver, $($arg),*))
                })
            }
        }
    };
}

impl_handlers!(0;);
impl_handlers!(1; A1);
impl_handlers!(2; A1, A2);
impl_handlers!(3; A1, A2, A3);
impl_handlers!(4; A1, A2, A3, A4);
impl_handlers!(5; A1, A2, A3, A4, A5);
impl_handlers!(6; A1, A2, A3, A4, A5, A6);
impl_handlers!(7; A1, A2, A3, A4, A5, A6, A7);
impl_handlers!(8; A1, A2, A3, A4, A5, A6, A7, A8);

/// 接收者声明的一个候选方法，尚未经过准入过滤。
pub(crate) struct MethodCandidate<R> {
    name: String,
    access: ReceiverAccess,
    arity: usize,
    output: OutputShape,
    // `SharedFn<R, O>` 或 `ExclusiveFn<R, O>`，具体取决于 `access`。
    handler: Box<dyn Any + Send + Sync>,
    _receiver: PhantomData<fn(&R)>,
}

impl<R> fmt::Debug for MethodCandidate<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCandidate")
            .field("name", &self.name)
            .field("access", &self.access)
            .field("arity", &self.arity)
            .field("output", &self.output.type_name)
            .finish()
    }
}

impl<R> MethodCandidate<R>
where
    R: Send + Sync + 'static,
{
    /// 将候选方法绑定到接收者。
    ///
    /// 仅当访问方式可达且处理闭包的返回值类型恰为 [`RpcResult`] 时返回 `Some`。
    fn bind(&self, cell: &ReceiverCell<R>) -> Option<Invoker> {
        match (self.access, cell) {
            (ReceiverAccess::Shared, ReceiverCell::Shared(receiver)) => {
                let handler = self.handler.downcast_ref::<SharedFn<R, RpcResult>>()?;
                let handler = Arc::clone(handler);
                let receiver = Arc::clone(receiver);
                let invoker: Invoker = Arc::new(move |args: Vec<Value>| handler(&*receiver, args));
                Some(invoker)
            }
            (ReceiverAccess::Shared, ReceiverCell::Exclusive(receiver)) => {
                let handler = self.handler.downcast_ref::<SharedFn<R, RpcResult>>()?;
                let handler = Arc::clone(handler);
                let receiver = Arc::clone(receiver);
                let invoker: Invoker = Arc::new(move |args: Vec<Value>| {
                    let guard = receiver.lock();
                    handler(&*guard, args)
                });
                Some(invoker)
            }
            (ReceiverAccess::Exclusive, ReceiverCell::Exclusive(receiver)) => {
                let handler = self.handler.downcast_ref::<ExclusiveFn<R, RpcResult>>()?;
                let handler = Arc::clone(handler);
                let receiver = Arc::clone(receiver);
                let invoker: Invoker = Arc::new(move |args: Vec<Value>| {
                    let mut guard = receiver.lock();
                    handler(&mut *guard, args)
                });
                Some(invoker)
            }
            (ReceiverAccess::Exclusive, ReceiverCell::Shared(_)) => None,
        }
    }
}

/// `MethodSet` 收集接收者声明的全部候选方法。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `method` 声明 `&self` 方法，`method_mut` 声明 `&mut self` 方法；
///   - 参数类型需实现 [`DeserializeOwned`]，最多 8 个；
///   - 同名方法重复声明时，后声明者替换先声明者；
///   - 任何返回类型都可以声明，是否可分发由准入过滤器在注册时决定。
/// - **执行 (How)**：声明时即完成类型擦除，注册表之后只与闭包打交道。
///
/// ```
/// use spark_rpc::{MethodSet, RpcReceiver, RpcResult};
///
/// struct Math;
///
/// impl Math {
///     fn add(&self, a: i64, b: i64) -> RpcResult {
///         RpcResult::ok(a + b)
///     }
/// }
///
/// impl RpcReceiver for Math {
///     fn methods(methods: &mut MethodSet<Self>) {
///         methods.method("Add", Math::add);
///     }
/// }
/// ```
pub struct MethodSet<R> {
    candidates: Vec<MethodCandidate<R>>,
}

impl<R> MethodSet<R>
where
    R: 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    /// 声明一个以 `&self` 访问接收者的方法。
    pub fn method<Args, H>(&mut self, name: impl Into<String>, handler: H) -> &mut Self
    where
        H: SharedHandler<R, Args>,
    {
        let handler: SharedFn<R, H::Output> = handler.into_shared_fn();
        self.push(MethodCandidate {
            name: name.into(),
            access: ReceiverAccess::Shared,
            arity: H::ARITY,
            output: OutputShape::of::<H::Output>(),
            handler: Box::new(handler),
            _receiver: PhantomData,
        })
    }

    /// 声明一个以 `&mut self` 访问接收者的方法。
    pub fn method_mut<Args, H>(&mut self, name: impl Into<String>, handler: H) -> &mut Self
    where
        H: ExclusiveHandler<R, Args>,
    {
        let handler: ExclusiveFn<R, H::Output> = handler.into_exclusive_fn();
        self.push(MethodCandidate {
            name: name.into(),
            access: ReceiverAccess::Exclusive,
            arity: H::ARITY,
            output: OutputShape::of::<H::Output>(),
            handler: Box::new(handler),
            _receiver: PhantomData,
        })
    }

    fn push(&mut self, candidate: MethodCandidate<R>) -> &mut Self {
        match self
            .candidates
            .iter_mut()
            .find(|existing| existing.name == candidate.name)
        {
            Some(existing) => *existing = candidate,
            None => self.candidates.push(candidate),
        }
        self
    }
}

/// 已准入并绑定接收者的可调用描述符。
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    arity: usize,
    access: ReceiverAccess,
    invoker: Invoker,
}

impl MethodDescriptor {
    /// 函数名。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 声明的参数个数，分发时必须与解码出的参数个数严格相等。
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// 访问方式。
    pub fn access(&self) -> ReceiverAccess {
        self.access
    }

    /// 以位置参数调用方法，接收者已在绑定时确定。
    pub(crate) fn invoke(&self, args: Vec<Value>) -> Result<RpcResult, ArgumentError> {
        (self.invoker)(args)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("access", &self.access)
            .finish()
    }
}

/// 候选方法被拒绝的原因。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Rejection {
    /// 方法在该接收者视图下不可达，静默跳过。
    Unreachable,
    /// 方法名未导出，静默跳过。
    Unexported,
    /// 返回值个数不是 1。
    OutputArity(usize),
    /// 唯一返回值不是 `RpcResult`。
    OutputShape(&'static str),
}

fn check<R>(candidate: &MethodCandidate<R>, view: ReceiverAccess) -> Result<(), Rejection> {
    if candidate.access == ReceiverAccess::Exclusive && view == ReceiverAccess::Shared {
        return Err(Rejection::Unreachable);
    }
    if !is_exported(&candidate.name) {
        return Err(Rejection::Unexported);
    }
    if candidate.output.arity != 1 {
        return Err(Rejection::OutputArity(candidate.output.arity));
    }
    if !candidate.output.is_result() {
        return Err(Rejection::OutputShape(candidate.output.type_name));
    }
    Ok(())
}

fn admitted<'a, R>(
    methods: &'a MethodSet<R>,
    view: ReceiverAccess,
    report: bool,
) -> impl Iterator<Item = &'a MethodCandidate<R>> + 'a {
    methods
        .candidates
        .iter()
        .filter(move |candidate| match check(candidate, view) {
            Ok(()) => true,
            Err(Rejection::OutputArity(outs)) => {
                if report {
                    tracing::warn!(
                        method = %candidate.name,
                        outs,
                        "method {} has wrong number of outs: {}",
                        candidate.name,
                        outs
                    );
                }
                false
            }
            Err(Rejection::OutputShape(returned)) => {
                if report {
                    tracing::warn!(
                        method = %candidate.name,
                        returns = returned,
                        "method {} returns {} not {}",
                        candidate.name,
                        returned,
                        type_name::<RpcResult>()
                    );
                }
                false
            }
            Err(Rejection::Unreachable | Rejection::Unexported) => false,
        })
}

/// 方法准入过滤器：返回在接收者视图下可分发的函数表。
///
/// `report` 为真时，对返回值个数或类型不符的方法逐一记录 `warn` 日志。
pub(crate) fn suitable_methods<R>(
    methods: &MethodSet<R>,
    cell: &ReceiverCell<R>,
    report: bool,
) -> BTreeMap<String, MethodDescriptor>
where
    R: Send + Sync + 'static,
{
    admitted(methods, cell.access(), report)
        .filter_map(|candidate| {
            let invoker = candidate.bind(cell)?;
            Some((candidate.name.clone(), MethodDescriptor {
                name: candidate.name.clone(),
                arity: candidate.arity,
                access: candidate.access,
                invoker,
            }))
        })
        .collect()
}

/// 仅统计指定视图下可准入的方法个数，不绑定接收者，不输出诊断。
pub(crate) fn count_suitable<R>(methods: &MethodSet<R>, view: ReceiverAccess) -> usize {
    admitted(methods, view, false).count()
}
