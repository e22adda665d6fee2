//! 平台事件
//!
//! 平台推送的事件先经过 [`EventFeed`]，把之后动作调用需要的句柄写入缓存：
//! 申请写入 [`PendingRequestCache`](crate::cache::PendingRequestCache)，
//! 临时会话写入 [`TempContactCache`](crate::cache::TempContactCache)，
//! 媒体交给 [`MediaStore`] 持久化。

use crate::cache::PendingRequest;
use crate::config::SessionConfig;
use crate::media::{self, MediaStore};
use crate::platform::{
    Contact, FriendAddRequest, GroupJoinRequest, ImageInfo, Platform, RecallHandle, VoiceInfo,
};
use crate::router::ApiRouter;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ============================================================================
// 1. 事件模型
// ============================================================================

/// 平台推送的事件
#[derive(Clone)]
pub enum PlatformEvent {
    /// 账号登录成功
    BotOnline(Arc<dyn Platform>),
    BotOffline(i64),
    FriendRequest {
        account_id: i64,
        request: FriendAddRequest,
    },
    GroupJoinRequest {
        account_id: i64,
        request: GroupJoinRequest,
    },
    Message {
        account_id: i64,
        message: InboundMessage,
    },
}

impl PlatformEvent {
    /// 事件所属的账号
    pub fn account_id(&self) -> i64 {
        match self {
            Self::BotOnline(platform) => platform.account_id(),
            Self::BotOffline(id) => *id,
            Self::FriendRequest { account_id, .. }
            | Self::GroupJoinRequest { account_id, .. }
            | Self::Message { account_id, .. } => *account_id,
        }
    }
}

/// 收到的消息
///
/// `subject` 为 [`Contact::Member`] 时表示通过群发起的临时会话。
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub subject: Contact,
    pub sender_id: i64,
    /// 平台为该消息提供的撤回句柄
    pub handle: Option<RecallHandle>,
    pub images: Vec<ImageInfo>,
    pub voices: Vec<VoiceInfo>,
}

impl InboundMessage {
    pub fn new(subject: Contact, sender_id: i64) -> Self {
        Self {
            subject,
            sender_id,
            handle: None,
            images: Vec::new(),
            voices: Vec::new(),
        }
    }
}

// ============================================================================
// 2. 事件订阅
// ============================================================================

/// 单个账号的事件订阅者
pub struct EventFeed {
    router: ApiRouter,
    media: Arc<dyn MediaStore>,
    config: SessionConfig,
}

impl EventFeed {
    pub fn new(router: ApiRouter, media: Arc<dyn MediaStore>, config: SessionConfig) -> Self {
        Self {
            router,
            media,
            config,
        }
    }

    /// 处理申请与消息事件，返回启动的后台媒体任务
    ///
    /// 上线/下线事件由 [`Gateway`](crate::gateway::Gateway) 处理，这里忽略。
    pub fn observe(&self, event: &PlatformEvent) -> Vec<JoinHandle<()>> {
        match event {
            PlatformEvent::FriendRequest { request, .. } => {
                self.observe_request(PendingRequest::Friend(request.clone()));
                Vec::new()
            }
            PlatformEvent::GroupJoinRequest { request, .. } => {
                self.observe_request(PendingRequest::GroupJoin(request.clone()));
                Vec::new()
            }
            PlatformEvent::Message { message, .. } => self.observe_message(message),
            PlatformEvent::BotOnline(_) | PlatformEvent::BotOffline(_) => Vec::new(),
        }
    }

    pub fn observe_request(&self, request: PendingRequest) {
        info!(
            target: "Event",
            "[{}] 收到申请 flag={}",
            self.router.account_id(),
            request.flag()
        );
        self.router.requests().add(request);
    }

    pub fn observe_message(&self, message: &InboundMessage) -> Vec<JoinHandle<()>> {
        if let Contact::Member { group_id, .. } = message.subject {
            self.router
                .temp_contacts()
                .record(message.sender_id, group_id);
        }

        if self.config.cache_inbound_source
            && let Some(handle) = &message.handle
        {
            self.router.sources().add(handle.clone());
        }

        let mut tasks = Vec::new();
        if self.config.cache_image {
            tasks.extend(message.images.iter().filter_map(|img| self.persist_image(img)));
        }
        if self.config.cache_record {
            tasks.extend(message.voices.iter().filter_map(|v| self.persist_voice(v)));
        }
        tasks
    }

    fn persist_image(&self, image: &ImageInfo) -> Option<JoinHandle<()>> {
        if image.md5.is_empty() {
            debug!(target: "Event", "图片缺少 MD5，跳过");
            return None;
        }

        let name = media::image_file_name(&media::upper_hex(&image.md5));
        let content = media::image_descriptor(image, chrono::Local::now().timestamp_millis());
        let store = self.media.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = store.save_image(&name, content.as_bytes()).await {
                warn!(target: "Media", "保存图片 {} 失败: {:#}", name, e);
            }
        }))
    }

    fn persist_voice(&self, voice: &VoiceInfo) -> Option<JoinHandle<()>> {
        let Some(url) = voice.url.clone() else {
            debug!(target: "Event", "语音缺少下载地址，跳过");
            return None;
        };

        let voice = voice.clone();
        let store = self.media.clone();
        Some(tokio::spawn(async move {
            let content = match store.download(&url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(target: "Media", "下载语音失败: {:#}", e);
                    return;
                }
            };
            let name = media::record_file_name(&media::voice_hash(&voice, &content));
            if let Err(e) = store.save_record(&name, &content).await {
                warn!(target: "Media", "保存语音 {} 失败: {:#}", name, e);
            }
        }))
    }
}
