//! 统一错误类型
//!
//! 平台层、参数层与动作层各自有独立的错误类型，
//! 最终都在 [`crate::router::ApiRouter`] 中被折叠为一个 [`ResponseEnvelope`](crate::response::ResponseEnvelope)。

use thiserror::Error;

/// 平台客户端返回的错误
#[derive(Debug, Error)]
pub enum PlatformError {
    /// 机器人在目标群中没有执行该操作的权限
    #[error("无操作权限: {0}")]
    PermissionDenied(String),

    #[error("群 {0} 不存在")]
    GroupNotFound(i64),

    #[error("群 {group_id} 中不存在成员 {user_id}")]
    MemberNotFound { group_id: i64, user_id: i64 },

    #[error("好友 {0} 不存在")]
    FriendNotFound(i64),

    #[error("账号未在线")]
    Offline,

    #[error("平台通信失败: {0}")]
    Transport(String),
}

impl PlatformError {
    /// 是否属于平台拒绝 (权限不足)
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// 请求参数缺失或类型不符
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("缺少必需参数 `{0}`")]
    Missing(&'static str),

    #[error("参数 `{key}` 类型错误，期望 {expected}")]
    IllTyped {
        key: &'static str,
        expected: &'static str,
    },
}

/// 消息缓存中找不到对应的撤回句柄
#[derive(Debug, Error, PartialEq, Eq)]
#[error("消息 {0} 不存在或已过期")]
pub struct SourceNotFound(pub i32);

/// 单个动作处理过程中的错误
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    SourceNotFound(#[from] SourceNotFound),

    /// 请求结构正确但内容无法处理 (如空消息)
    #[error("无效请求: {0}")]
    Malformed(String),

    /// 平台明确拒绝，但不是权限异常 (如重复处理同一申请)
    #[error("平台拒绝: {0}")]
    Rejected(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// 私聊目标既不是好友，也不在任何已知群中
    #[error("无法找到用户 {0} 的会话")]
    NoRoute(i64),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ActionResult<T> = Result<T, ActionError>;
