//! 调用分发端到端契约。
//!
//! # 教案式说明
//! - **意图 (Why)**：从传输层视角验证 `call(service, payload) -> bytes`，只观察序列化后的信封，
//!   不依赖任何内部类型。
//! - **契约 (What)**：
//!   - 参数个数与声明一致时，返回方法自身的结果且不做修改；
//!   - 相同请求对纯函数重复调用，响应字节完全一致；
//!   - 返回形状不是 `RpcResult` 的方法即使声明在接收者上，也不可调用；
//!   - 独占视图下的 `&mut self` 方法按调用顺序累积状态。

use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use spark_rpc::{ErrorCode, MethodSet, RpcReceiver, RpcResult, RpcServer};

struct Math;

impl Math {
    fn add(&self, a: i64, b: i64) -> RpcResult {
        RpcResult::ok(a + b)
    }

    fn neg(&self, a: i64) -> RpcResult {
        RpcResult::ok(-a)
    }

    fn pi(&self) -> RpcResult {
        RpcResult::ok(2.5)
    }

    fn split(&self, a: i64) -> (RpcResult, bool) {
        (RpcResult::ok(a), true)
    }

    fn raw(&self, a: i64) -> i64 {
        a
    }
}

impl RpcReceiver for Math {
    fn methods(methods: &mut MethodSet<Self>) {
        methods
            .method("Add", Math::add)
            .method("Neg", Math::neg)
            .method("Pi", Math::pi)
            .method("Split", Math::split)
            .method("Raw", Math::raw);
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct Point {
    x: i32,
    y: i32,
}

struct Geometry;

impl RpcReceiver for Geometry {
    fn methods(methods: &mut MethodSet<Self>) {
        methods.method("Mirror", |_: &Geometry, p: Point| {
            RpcResult::ok_serialized(&Point { x: p.y, y: p.x })
                .unwrap_or_else(|err| RpcResult::error(1, err.to_string()))
        });
        methods.method(
            "Describe",
            |_: &Geometry, label: String, tags: Vec<String>, strict: Option<bool>| {
                RpcResult::ok(json!({ "label": label, "tags": tags, "strict": strict }))
            },
        );
    }
}

#[derive(Default)]
struct Counter {
    total: i64,
}

impl RpcReceiver for Counter {
    fn methods(methods: &mut MethodSet<Self>) {
        methods
            .method_mut("Incr", |counter: &mut Counter, by: i64| {
                counter.total += by;
                RpcResult::ok(counter.total)
            })
            .method("Get", |counter: &Counter| RpcResult::ok(counter.total));
    }
}

fn server() -> RpcServer {
    let server = RpcServer::new();
    server.register(Math).unwrap();
    server.register(Geometry).unwrap();
    server.register_exclusive(Counter::default()).unwrap();
    server
}

fn envelope(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[test]
fn math_scenario() {
    let server = server();
    assert_eq!(
        server.call("Math", br#"["Add",2,3]"#),
        br#"{"ret":5,"err_code":0,"err_msg":""}"#
    );
    assert_eq!(envelope(&server.call("Math", br#"["Add",2]"#))["err_code"], json!(512));
    assert_eq!(
        envelope(&server.call("Unknown", br#"["Add",2,3]"#))["err_code"],
        json!(501)
    );
    assert_eq!(
        envelope(&server.call("Math", b"not-json-array"))["err_code"],
        json!(511)
    );
}

#[test]
fn envelope_always_has_three_fields() {
    let server = server();
    for (service, payload) in [
        ("Math", &br#"["Add",2,3]"#[..]),
        ("Math", &b"[]"[..]),
        ("Math", &br#"["Nope"]"#[..]),
        ("Ghost", &b"\x00"[..]),
    ] {
        let response = envelope(&server.call(service, payload));
        let object = response.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert!(object.contains_key("ret"));
        assert!(object["err_code"].is_i64());
        assert!(object["err_msg"].is_string());
    }
}

#[test]
fn zero_and_unary_methods_dispatch() {
    let server = server();
    assert_eq!(server.call_result("Math", br#"["Neg",4]"#), RpcResult::ok(-4));
    assert_eq!(server.call_result("Math", br#"["Pi"]"#), RpcResult::ok(2.5));
    assert_eq!(
        server.call_result("Math", br#"["Pi",1]"#).err_code,
        ErrorCode::Parameter.code()
    );
}

#[test]
fn structured_arguments_are_converted() {
    let server = server();
    assert_eq!(
        server.call_result("Geometry", br#"["Mirror",{"x":1,"y":2}]"#),
        RpcResult::ok(json!({ "x": 2, "y": 1 }))
    );
    assert_eq!(
        server.call_result("Geometry", br#"["Describe","a",["t1","t2"],null]"#),
        RpcResult::ok(json!({ "label": "a", "tags": ["t1", "t2"], "strict": null }))
    );
    assert_eq!(
        server
            .call_result("Geometry", br#"["Mirror",{"x":"one","y":2}]"#)
            .err_code,
        ErrorCode::Parameter.code()
    );
}

#[test]
fn repeated_calls_are_byte_identical() {
    let server = server();
    let request = br#"["Add",40,2]"#;
    assert_eq!(server.call("Math", request), server.call("Math", request));

    let failure = br#"["Add","x",2]"#;
    assert_eq!(server.call("Math", failure), server.call("Math", failure));
}

#[test]
fn only_result_returning_methods_are_callable() {
    let server = server();
    let service = server.registry().lookup("Math").unwrap();
    assert_eq!(
        service.method_names().collect::<Vec<_>>(),
        vec!["Add", "Neg", "Pi"]
    );

    for payload in [&br#"["Split",1]"#[..], &br#"["Raw",1]"#[..]] {
        assert_eq!(
            server.call_result("Math", payload).err_code,
            ErrorCode::FunctionNotFound.code()
        );
    }
}

#[test]
fn exclusive_receiver_accumulates_state() {
    let server = Arc::new(server());
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let server = Arc::clone(&server);
            thread::spawn(move || {
                for _ in 0..25 {
                    assert!(server.call_result("Counter", br#"["Incr",1]"#).is_success());
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(
        server.call_result("Counter", br#"["Get"]"#),
        RpcResult::ok(100)
    );
}
