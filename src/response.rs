//! 响应信封与数据载荷
//!
//! 每次动作调用都返回且只返回一个 [`ResponseEnvelope`]。
//! 信封的判别集合对所有动作固定，载荷形状随动作变化。

use crate::params::ParamMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// 1. 信封
// ============================================================================

/// 动作调用结果
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    /// 调用成功，携带动作相关的载荷
    Success(Payload),
    /// 已转入后台执行 (`_async` 后缀)
    AsyncAccepted,
    /// 平台拒绝执行 (权限不足或功能不受支持)
    PlatformRejected,
    /// 请求缺少必要字段、字段类型错误或动作未知
    MalformedRequest,
    /// 其他内部错误
    PluginFailure,
}

/// 协议边界上的结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    Ok,
    PlatformDeclined,
    BadRequest,
    InternalError,
}

impl ResponseEnvelope {
    pub fn success(payload: Payload) -> Self {
        Self::Success(payload)
    }

    /// 无载荷的成功
    pub fn ok() -> Self {
        Self::Success(Payload::None)
    }

    pub fn async_accepted() -> Self {
        Self::AsyncAccepted
    }

    pub fn rejected() -> Self {
        Self::PlatformRejected
    }

    pub fn malformed() -> Self {
        Self::MalformedRequest
    }

    pub fn failure() -> Self {
        Self::PluginFailure
    }

    pub fn class(&self) -> OutcomeClass {
        match self {
            Self::Success(_) | Self::AsyncAccepted => OutcomeClass::Ok,
            Self::PlatformRejected => OutcomeClass::PlatformDeclined,
            Self::MalformedRequest => OutcomeClass::BadRequest,
            Self::PluginFailure => OutcomeClass::InternalError,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// 协议中的 status 字段
    pub fn status(&self) -> &'static str {
        match self {
            Self::Success(_) => "ok",
            Self::AsyncAccepted => "async",
            _ => "failed",
        }
    }

    /// 协议中的 retcode 字段
    pub fn retcode(&self) -> i32 {
        match self {
            Self::Success(_) => 0,
            Self::AsyncAccepted => 1,
            Self::MalformedRequest => 100,
            Self::PlatformRejected => 102,
            Self::PluginFailure => 103,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Success(p) => Some(p),
            _ => None,
        }
    }

    /// 转换为协议响应帧
    pub fn into_response(self, echo: Option<Value>) -> ApiResponse {
        ApiResponse {
            status: self.status(),
            retcode: self.retcode(),
            data: match self {
                Self::Success(p) => p,
                _ => Payload::None,
            },
            echo,
        }
    }
}

// ============================================================================
// 2. 载荷
// ============================================================================

/// 各动作的返回数据
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    None,
    MessageId(MessageIdData),
    LoginInfo(LoginInfo),
    FriendList(Vec<FriendData>),
    GroupList(Vec<GroupData>),
    GroupInfo(GroupInfo),
    MemberInfo(MemberInfo),
    MemberList(Vec<MemberInfo>),
    CanSend(CanSendData),
    Status(PluginStatus),
    Version(VersionInfo),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageIdData {
    pub message_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginInfo {
    pub user_id: i64,
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FriendData {
    pub user_id: i64,
    pub nickname: String,
    pub remark: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupData {
    pub group_id: i64,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupInfo {
    pub group_id: i64,
    pub group_name: String,
    pub member_count: i32,
    pub max_member_count: i32,
}

/// 群成员信息
/// 平台不提供的字段 (性别、年龄、地区、等级) 填充为固定值
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberInfo {
    pub group_id: i64,
    pub user_id: i64,
    pub nickname: String,
    pub card: String,
    pub sex: String, // "male", "female", or "unknown"
    pub age: i32,
    pub area: String,
    pub join_time: i64,
    pub last_sent_time: i64,
    pub level: String,
    pub role: String, // "owner", "admin", or "member"
    pub unfriendly: bool,
    pub title: String,
    pub title_expire_time: i64,
    pub card_changeable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanSendData {
    pub yes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginStatus {
    pub app_initialized: bool,
    pub app_enabled: bool,
    pub plugins_good: bool,
    pub app_good: bool,
    pub online: bool,
    pub good: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionInfo {
    pub coolq_directory: String,
    pub coolq_edition: String,
    pub plugin_version: String,
    pub plugin_build_number: String,
    pub plugin_build_configuration: String,
}

// ============================================================================
// 3. 协议帧
// ============================================================================

/// 调用请求帧
#[derive(Debug, Clone, Deserialize)]
pub struct ApiRequest {
    pub action: String,
    #[serde(default)]
    pub params: ParamMap,
    #[serde(default)]
    pub echo: Option<Value>,
}

/// 调用响应帧
/// 格式: { status, retcode, data, echo }
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: &'static str,
    pub retcode: i32,
    pub data: Payload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub echo: Option<Value>,
}

impl ApiResponse {
    /// 序列化为 JSON 文本，失败时退化为固定的内部错误帧
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"status":"failed","retcode":103,"data":null}"#.to_string()
        })
    }
}
