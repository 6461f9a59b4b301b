//! 调用负载解码。
//!
//! 负载必须是一个非空 JSON 数组：首元素为函数名字符串，其余元素按调用顺序作为位置参数，
//! 例如 `["Add", 2, 3]`。任何一步失败都返回 [`DecodeError`]，不会产出部分结果。

use serde_json::Value;

use crate::error::DecodeError;

/// 解码后的调用：函数名与按序排列的位置参数。
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedCall {
    pub function: String,
    pub args: Vec<Value>,
}

impl DecodedCall {
    /// 位置参数个数（不含函数名）。
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

/// 将调用负载解析为 [`DecodedCall`]。
pub fn decode_call(payload: &[u8]) -> Result<DecodedCall, DecodeError> {
    let document: Value = serde_json::from_slice(payload)?;
    let Value::Array(elements) = document else {
        return Err(DecodeError::NotAnArray);
    };

    let mut elements = elements.into_iter();
    let function = match elements.next() {
        Some(Value::String(function)) => function,
        Some(_) => return Err(DecodeError::FunctionNameNotString),
        None => return Err(DecodeError::EmptyCall),
    };

    Ok(DecodedCall {
        function,
        args: elements.collect(),
    })
}
