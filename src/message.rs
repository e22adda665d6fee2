//! 消息链
//!
//! 协议中的 `message` 字段有三种形态：CQ 码字符串、单个消息段对象、消息段数组。
//! [`MessageChain::from_wire`] 把它们统一转换为平台可发送的元素序列。

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::OnceLock;

/// 媒体来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Url(String),
    /// 平台侧文件名或本地路径
    File(String),
    /// `base64://` 解码后的内容
    Bytes(Vec<u8>),
}

impl MediaSource {
    /// 解析 `file` 字段，`base64://` 内容无法解码时返回 None
    pub fn parse(file: &str) -> Option<Self> {
        if let Some(encoded) = file.strip_prefix("base64://") {
            return BASE64.decode(encoded.trim()).ok().map(Self::Bytes);
        }
        if file.starts_with("http://") || file.starts_with("https://") {
            return Some(Self::Url(file.to_string()));
        }
        Some(Self::File(file.to_string()))
    }
}

/// 消息元素
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// 纯文本
    Text(String),
    /// @某人
    At(i64),
    /// @全体成员
    AtAll,
    /// QQ 表情 (ID)
    Face(i32),
    Image(MediaSource),
    /// 语音
    Record(MediaSource),
    /// 回复消息
    Reply(i32),
    /// 未识别的消息段，原样交给平台
    Raw { kind: String, data: Map<String, Value> },
}

/// 消息链 (Message Chain)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageChain(Vec<Element>);

impl MessageChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, element: Element) -> Self {
        self.0.push(element);
        self
    }

    /// 纯文本
    pub fn text(self, text: impl Into<String>) -> Self {
        self.push(Element::Text(text.into()))
    }

    /// @某人
    pub fn at(self, user_id: i64) -> Self {
        self.push(Element::At(user_id))
    }

    /// 回复消息
    pub fn reply(self, message_id: i32) -> Self {
        self.push(Element::Reply(message_id))
    }

    pub fn elements(&self) -> &[Element] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 拼接所有文本元素
    pub fn plain_text(&self) -> String {
        self.0
            .iter()
            .filter_map(|e| match e {
                Element::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// 从协议中的 message 字段构建消息链
    ///
    /// - `auto_escape` 为真时，字符串消息按纯文本发送，不解析 CQ 码
    /// - 结果为空时返回 None
    pub fn from_wire(message: Option<&Value>, auto_escape: bool) -> Option<Self> {
        let elements = match message? {
            Value::String(s) if auto_escape => vec![Element::Text(s.clone())],
            Value::String(s) => parse_cq_string(s),
            Value::Object(seg) => parse_segment(seg).into_iter().collect(),
            Value::Array(segs) => segs
                .iter()
                .filter_map(|seg| match seg {
                    Value::Object(obj) => parse_segment(obj),
                    Value::String(s) => Some(Element::Text(s.clone())),
                    _ => None,
                })
                .collect(),
            _ => return None,
        };

        let elements: Vec<Element> = elements
            .into_iter()
            .filter(|e| !matches!(e, Element::Text(t) if t.is_empty()))
            .collect();

        if elements.is_empty() {
            None
        } else {
            Some(Self(elements))
        }
    }
}

// 允许直接从字符串字面量转换为纯文本消息
impl From<&str> for MessageChain {
    fn from(s: &str) -> Self {
        MessageChain::new().text(s)
    }
}

impl From<String> for MessageChain {
    fn from(s: String) -> Self {
        MessageChain::new().text(s)
    }
}

/// 以 CQ 码形式输出，用于日志
impl fmt::Display for MessageChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.0 {
            match element {
                Element::Text(t) => write!(f, "{}", escape(t, false))?,
                Element::At(id) => write!(f, "[CQ:at,qq={}]", id)?,
                Element::AtAll => write!(f, "[CQ:at,qq=all]")?,
                Element::Face(id) => write!(f, "[CQ:face,id={}]", id)?,
                Element::Image(_) => write!(f, "[图片]")?,
                Element::Record(_) => write!(f, "[语音]")?,
                Element::Reply(id) => write!(f, "[CQ:reply,id={}]", id)?,
                Element::Raw { kind, .. } => write!(f, "[CQ:{}]", kind)?,
            }
        }
        Ok(())
    }
}

// ================== CQ 码解析 ==================

static CQ_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_cq_regex() -> &'static Regex {
    CQ_REGEX.get_or_init(|| Regex::new(r"\[CQ:([^,\[\]]+)((?:,[^,\[\]]*)*)\]").expect("Invalid Regex"))
}

/// CQ 码转义
pub fn escape(text: &str, in_param: bool) -> String {
    let s = text
        .replace('&', "&amp;")
        .replace('[', "&#91;")
        .replace(']', "&#93;");
    if in_param { s.replace(',', "&#44;") } else { s }
}

/// CQ 码反转义 (`&amp;` 最后处理)
pub fn unescape(text: &str) -> String {
    text.replace("&#91;", "[")
        .replace("&#93;", "]")
        .replace("&#44;", ",")
        .replace("&amp;", "&")
}

fn parse_cq_string(raw: &str) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut cursor = 0;

    for caps in get_cq_regex().captures_iter(raw) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > cursor {
            elements.push(Element::Text(unescape(&raw[cursor..whole.start()])));
        }
        cursor = whole.end();

        let kind = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let mut data = Map::new();
        if let Some(params) = caps.get(2) {
            for pair in params.as_str().split(',').filter(|p| !p.is_empty()) {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                data.insert(k.to_string(), Value::from(unescape(v)));
            }
        }

        if let Some(e) = parse_segment_parts(kind, &data) {
            elements.push(e);
        }
    }

    if cursor < raw.len() {
        elements.push(Element::Text(unescape(&raw[cursor..])));
    }
    elements
}

// ================== 消息段解析 ==================

fn data_text(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_segment(seg: &Map<String, Value>) -> Option<Element> {
    let kind = seg.get("type").and_then(Value::as_str)?;
    let empty = Map::new();
    let data = seg.get("data").and_then(Value::as_object).unwrap_or(&empty);
    parse_segment_parts(kind, data)
}

fn parse_segment_parts(kind: &str, data: &Map<String, Value>) -> Option<Element> {
    let raw = || Element::Raw {
        kind: kind.to_string(),
        data: data.clone(),
    };

    let element = match kind {
        "text" => Element::Text(data_text(data, "text")?),
        "at" => match data_text(data, "qq").as_deref() {
            Some("all") => Element::AtAll,
            Some(qq) => qq.parse().map(Element::At).unwrap_or_else(|_| raw()),
            None => raw(),
        },
        "face" => data_text(data, "id")
            .and_then(|id| id.parse().ok())
            .map(Element::Face)
            .unwrap_or_else(raw),
        "image" | "record" => {
            let file = data_text(data, "file").or_else(|| data_text(data, "url"));
            match file.as_deref().and_then(MediaSource::parse) {
                Some(src) if kind == "image" => Element::Image(src),
                Some(src) => Element::Record(src),
                None => raw(),
            }
        }
        "reply" => data_text(data, "id")
            .and_then(|id| id.parse().ok())
            .map(Element::Reply)
            .unwrap_or_else(raw),
        _ => raw(),
    };
    Some(element)
}

// ================== 快速回复辅助 ==================

/// 构建 @ 消息段
pub fn at_segment(user_id: i64) -> Value {
    json!({ "type": "at", "data": { "qq": user_id } })
}

/// 在回复内容前插入 @ 发送者
///
/// - 数组：在首位插入 @ 段
/// - 单个消息段：组成 [@, 段] 两元素数组
/// - 字符串：拼接 CQ 码；若要求不转义，则改为 [@, 文本段] 数组
pub fn prefix_at(reply: &Value, user_id: i64, auto_escape: bool) -> Value {
    match reply {
        Value::Array(segs) => {
            let mut chain = Vec::with_capacity(segs.len() + 1);
            chain.push(at_segment(user_id));
            chain.extend(segs.iter().cloned());
            Value::Array(chain)
        }
        Value::Object(_) => Value::Array(vec![at_segment(user_id), reply.clone()]),
        other => {
            let content = match other {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                v => v.to_string(),
            };
            if auto_escape {
                Value::Array(vec![
                    at_segment(user_id),
                    json!({ "type": "text", "data": { "text": content } }),
                ])
            } else {
                Value::String(format!("[CQ:at,qq={}] {}", user_id, content))
            }
        }
    }
}
