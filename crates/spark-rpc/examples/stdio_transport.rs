//! 基于标准输入输出的最小传输层示例。
//!
//! # 教案级说明
//! - **意图 (Why)**：演示传输层如何只依赖 [`Dispatch`] 接口完成“分帧 → 投递 → 回写”，
//!   分发核心本身不接触任何 I/O。
//! - **契约 (What)**：每行一次调用，格式为 `<服务名>\t<调用负载>`；每行输出一个结果信封。
//!   缺少制表符的行视为服务名为空的调用，由核心回以 `501`。
//! - **用法**：
//!
//! ```text
//! $ printf 'Math\t["Add",2,3]\nMath\t["Div",1,0]\n' | cargo run -p spark-rpc --example stdio_transport
//! {"ret":5.0,"err_code":0,"err_msg":""}
//! {"ret":null,"err_code":1,"err_msg":"division by zero"}
//! ```
//!
//! 可选的第一个命令行参数为 TOML 配置文件路径，见 [`RpcConfig`]。

use std::error::Error;
use std::io::{self, BufRead, Write};

use spark_rpc::observability;
use spark_rpc::{Dispatch, MethodSet, RpcConfig, RpcReceiver, RpcResult, RpcServer};

struct Math;

impl Math {
    fn add(&self, a: f64, b: f64) -> RpcResult {
        RpcResult::ok(a + b)
    }

    fn div(&self, a: f64, b: f64) -> RpcResult {
        if b == 0.0 {
            return RpcResult::error(1, "division by zero");
        }
        RpcResult::ok(a / b)
    }
}

impl RpcReceiver for Math {
    fn methods(methods: &mut MethodSet<Self>) {
        methods.method("Add", Math::add).method("Div", Math::div);
    }
}

#[derive(Default)]
struct Notes {
    lines: Vec<String>,
}

impl RpcReceiver for Notes {
    fn methods(methods: &mut MethodSet<Self>) {
        methods
            .method_mut("Push", |notes: &mut Notes, line: String| {
                notes.lines.push(line);
                RpcResult::ok(notes.lines.len())
            })
            .method("List", |notes: &Notes| RpcResult::ok(notes.lines.clone()));
    }
}

/// 逐行读取调用并写回响应，直到输入结束。
fn serve(dispatch: &dyn Dispatch, input: impl BufRead, mut output: impl Write) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (service, payload) = line.split_once('\t').unwrap_or(("", line.as_str()));
        let response = dispatch.dispatch(service.trim(), payload.as_bytes());
        output.write_all(&response)?;
        output.write_all(b"\n")?;
        output.flush()?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => RpcConfig::load(path)?,
        None => RpcConfig::default(),
    };
    observability::install(&config)?;

    let server = RpcServer::with_config(&config);
    server.register(Math)?;
    server.register_exclusive(Notes::default())?;
    tracing::info!(services = ?server.registry().service_names(), "stdio transport ready");

    serve(&server, io::stdin().lock(), io::stdout().lock())?;
    Ok(())
}
