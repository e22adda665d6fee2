//! 平台客户端接口
//!
//! 路由层只通过 [`Platform`] 访问底层聊天平台：联系人查询、消息发送与撤回、群管理、申请处理。
//! 平台返回的句柄 ([`RecallHandle`]、[`FriendAddRequest`]、[`GroupJoinRequest`]) 对路由层不透明，
//! 只在缓存中保存，之后原样交还给平台。

use crate::error::PlatformResult;
use crate::message::MessageChain;
use async_trait::async_trait;
use std::sync::Arc;

pub mod memory;

// ============================================================================
// 1. 联系人模型
// ============================================================================

/// 消息发送目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Contact {
    /// 好友私聊
    Friend(i64),
    /// 群聊
    Group(i64),
    /// 通过群发起的临时会话
    Member { group_id: i64, user_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Friend {
    pub id: i64,
    pub nickname: String,
    pub remark: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

/// 群成员权限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemberRole {
    Owner,
    Administrator,
    #[default]
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Administrator => "admin",
            Self::Member => "member",
        }
    }

    /// 是否具有管理权限
    pub fn is_operator(&self) -> bool {
        !matches!(self, Self::Member)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Member {
    pub group_id: i64,
    pub user_id: i64,
    pub nickname: String,
    pub card: String,
    pub special_title: String,
    pub role: MemberRole,
    /// 入群时间 (秒级时间戳)，未知为 0
    pub join_time: i64,
    /// 最后发言时间 (秒级时间戳)，未知为 0
    pub last_speak_time: i64,
}

// ============================================================================
// 2. 平台句柄
// ============================================================================

/// 已发送消息的撤回凭证
///
/// `id` 是平台在发送时分配的消息 ID，`token` 由平台自行解释。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecallHandle {
    pub id: i32,
    pub target: Contact,
    pub token: Arc<str>,
}

/// 好友申请
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendAddRequest {
    pub event_id: i64,
    pub from_id: i64,
    pub from_nick: String,
    pub message: String,
}

/// 加群申请
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupJoinRequest {
    pub event_id: i64,
    pub from_id: i64,
    pub from_nick: String,
    pub group_id: i64,
    pub group_name: String,
    pub message: String,
}

// ============================================================================
// 3. 媒体访问接口
// ============================================================================

/// 收到的图片，由平台直接提供哈希与尺寸
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageInfo {
    pub md5: Vec<u8>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub byte_size: Option<u64>,
}

impl ImageInfo {
    /// 图片大小：优先使用字节数，否则退化为像素数
    pub fn size(&self) -> u64 {
        self.byte_size.unwrap_or_else(|| match (self.width, self.height) {
            (Some(w), Some(h)) => u64::from(w).saturating_mul(u64::from(h)),
            _ => 0,
        })
    }
}

/// 收到的语音
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoiceInfo {
    pub md5: Vec<u8>,
    pub url: Option<String>,
}

// ============================================================================
// 4. 平台接口
// ============================================================================

/// 平台客户端
///
/// 所有方法都可能挂起等待网络 I/O。权限不足必须以
/// [`PlatformError::PermissionDenied`](crate::error::PlatformError::PermissionDenied) 报告。
#[async_trait]
pub trait Platform: Send + Sync + 'static {
    /// 当前登录账号
    fn account_id(&self) -> i64;

    fn nickname(&self) -> String;

    fn is_online(&self) -> bool;

    // ----- 联系人 -----

    async fn friends(&self) -> PlatformResult<Vec<Friend>>;

    /// 查找好友，非好友返回 `Ok(None)`
    async fn friend(&self, user_id: i64) -> PlatformResult<Option<Friend>>;

    async fn groups(&self) -> PlatformResult<Vec<Group>>;

    async fn group(&self, group_id: i64) -> PlatformResult<Group>;

    /// 群成员列表，平台可能不包含机器人自身
    async fn members(&self, group_id: i64) -> PlatformResult<Vec<Member>>;

    async fn member(&self, group_id: i64, user_id: i64) -> PlatformResult<Member>;

    /// 机器人自身在群中的成员信息
    async fn self_member(&self, group_id: i64) -> PlatformResult<Member>;

    // ----- 消息 -----

    async fn send_message(
        &self,
        target: Contact,
        chain: &MessageChain,
    ) -> PlatformResult<RecallHandle>;

    async fn recall(&self, handle: &RecallHandle) -> PlatformResult<()>;

    // ----- 群管理 -----

    async fn kick(&self, group_id: i64, user_id: i64) -> PlatformResult<()>;

    async fn mute(&self, group_id: i64, user_id: i64, seconds: u32) -> PlatformResult<()>;

    async fn unmute(&self, group_id: i64, user_id: i64) -> PlatformResult<()>;

    async fn set_mute_all(&self, group_id: i64, enabled: bool) -> PlatformResult<()>;

    async fn set_name_card(&self, group_id: i64, user_id: i64, card: &str) -> PlatformResult<()>;

    async fn set_special_title(
        &self,
        group_id: i64,
        user_id: i64,
        title: &str,
    ) -> PlatformResult<()>;

    async fn set_group_name(&self, group_id: i64, name: &str) -> PlatformResult<()>;

    async fn quit_group(&self, group_id: i64) -> PlatformResult<()>;

    async fn post_announcement(&self, group_id: i64, content: &str) -> PlatformResult<()>;

    // ----- 申请处理 -----

    async fn resolve_friend_request(
        &self,
        request: &FriendAddRequest,
        accept: bool,
        remark: Option<&str>,
    ) -> PlatformResult<()>;

    async fn resolve_join_request(
        &self,
        request: &GroupJoinRequest,
        accept: bool,
        reason: Option<&str>,
    ) -> PlatformResult<()>;
}
