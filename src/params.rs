//! 请求参数访问工具
//!
//! 协议侧的参数是松散类型的 JSON 对象：数字可能以字符串形式出现，布尔值可能是 `"true"`。
//! 这里的读取规则与传统 CQHTTP 实现保持一致。

use crate::error::ParamError;
use serde_json::Value;

/// 一次调用的参数表
pub type ParamMap = serde_json::Map<String, Value>;

/// 参数表的宽松读取方法
pub trait ParamsExt {
    /// 取出非 null 的原始值
    fn value(&self, key: &str) -> Option<&Value>;

    /// 读取整数，允许数字字符串；缺失或 null 返回 `Ok(None)`
    fn long(&self, key: &'static str) -> Result<Option<i64>, ParamError>;

    /// 读取 32 位整数 (消息 ID、时长等)
    fn int(&self, key: &'static str) -> Result<Option<i32>, ParamError> {
        match self.long(key)? {
            Some(v) => i32::try_from(v)
                .map(Some)
                .map_err(|_| ParamError::IllTyped {
                    key,
                    expected: "32 位整数",
                }),
            None => Ok(None),
        }
    }

    /// 读取必需的整数
    fn require_long(&self, key: &'static str) -> Result<i64, ParamError> {
        self.long(key)?.ok_or(ParamError::Missing(key))
    }

    /// 读取布尔值，无法识别时使用默认值
    fn boolean_or(&self, key: &str, default: bool) -> bool;

    /// 读取文本内容，数字与布尔值会被转换为字符串
    fn text(&self, key: &str) -> Option<String>;

    /// 键存在且不为 null
    fn is_present(&self, key: &str) -> bool {
        self.value(key).is_some()
    }
}

impl ParamsExt for ParamMap {
    fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|v| !v.is_null())
    }

    fn long(&self, key: &'static str) -> Result<Option<i64>, ParamError> {
        let ill_typed = ParamError::IllTyped {
            key,
            expected: "整数",
        };
        match self.value(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_u64().and_then(|v| i64::try_from(v).ok()))
                .map(Some)
                .ok_or(ill_typed),
            Some(Value::String(s)) => s.parse::<i64>().map(Some).map_err(|_| ill_typed),
            Some(_) => Err(ill_typed),
        }
    }

    fn boolean_or(&self, key: &str, default: bool) -> bool {
        match self.value(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
            _ => default,
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        match self.value(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// 从 JSON 值中取出对象，非对象返回 None
pub fn as_param_map(value: Option<&Value>) -> Option<&ParamMap> {
    value.and_then(Value::as_object)
}
