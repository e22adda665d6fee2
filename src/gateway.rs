//! 网关生命周期
//!
//! 启用时为已在线且已配置的账号创建会话，之后持续消费平台事件：
//! 上线创建会话、下线关闭会话，其余事件交给对应会话的 [`EventFeed`](crate::event::EventFeed)。

use crate::config::AppConfig;
use crate::event::PlatformEvent;
use crate::media::MediaStore;
use crate::platform::Platform;
use crate::session::{BotSession, SessionManager};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct Gateway {
    config: AppConfig,
    sessions: &'static SessionManager,
    media: Arc<dyn MediaStore>,
    enabled: AtomicBool,
}

impl Gateway {
    pub fn new(
        config: AppConfig,
        sessions: &'static SessionManager,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            config,
            sessions,
            media,
            enabled: AtomicBool::new(false),
        }
    }

    pub fn sessions(&self) -> &'static SessionManager {
        self.sessions
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// 启用网关，为已在线的账号创建会话
    pub async fn enable(&self, online: &[Arc<dyn Platform>]) {
        self.enabled.store(true, Ordering::SeqCst);
        info!(target: "Gateway", "网关已启用 v{}", env!("CARGO_PKG_VERSION"));

        for platform in online {
            if self.sessions.contains(platform.account_id()).await {
                debug!(target: "Gateway", "{} 已存在", platform.account_id());
                continue;
            }
            self.open_session(platform.clone()).await;
        }
    }

    /// 处理一个平台事件，返回事件触发的后台任务
    pub async fn handle_event(&self, event: PlatformEvent) -> Vec<JoinHandle<()>> {
        if !self.is_enabled() {
            return Vec::new();
        }

        match &event {
            PlatformEvent::BotOnline(platform) => {
                if !self.sessions.contains(platform.account_id()).await {
                    self.open_session(platform.clone()).await;
                }
                Vec::new()
            }
            PlatformEvent::BotOffline(account_id) => {
                self.sessions.close(*account_id).await;
                Vec::new()
            }
            _ => match self.sessions.get(event.account_id()).await {
                Some(session) => session.feed().observe(&event),
                None => {
                    debug!(target: "Gateway", "账号 {} 没有会话，忽略事件", event.account_id());
                    Vec::new()
                }
            },
        }
    }

    /// 持续消费事件，直到通道关闭或网关被停用
    pub async fn run(&self, mut events: mpsc::Receiver<PlatformEvent>) {
        while let Some(event) = events.recv().await {
            if !self.is_enabled() {
                break;
            }
            self.handle_event(event).await;
        }
        debug!(target: "Gateway", "事件循环已退出");
    }

    /// 停用网关并关闭所有会话
    pub async fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.sessions.close_all().await;
        info!(target: "Gateway", "网关已停用");
    }

    async fn open_session(&self, platform: Arc<dyn Platform>) {
        let account_id = platform.account_id();
        let Some(config) = self.config.session_config(account_id) else {
            debug!(target: "Gateway", "{} 未进行配置", account_id);
            return;
        };

        let session = BotSession::new(platform, config, &self.config.data_dir, self.media.clone());
        self.sessions.register(session).await;
    }
}
