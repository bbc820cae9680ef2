//! API 类型定义
//!
//! 执行的输出类型。

use moonbridge_core::{NativeObject, State, Value};

/// 执行输出
#[derive(Debug)]
pub struct ExecuteOutput {
    /// 执行所用的 State（可继续读取全局变量或再次执行）
    pub state: State,
    /// 块的返回值
    pub values: Vec<Value>,
}

impl ExecuteOutput {
    /// 返回值的显示形式；原生对象使用自身的显示字符串
    pub fn display_values(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|v| match v.to_native_object() {
                Some(obj) => obj.to_display_string(),
                None => v.to_string(),
            })
            .collect()
    }
}
