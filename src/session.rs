//! 会话注册表
//!
//! 每个已登录且已配置的账号对应一个 [`BotSession`] (路由器 + 缓存 + 事件订阅)。
//! 会话在上线时创建、下线时关闭，生命周期由 [`Gateway`](crate::gateway::Gateway) 管理。

use crate::config::SessionConfig;
use crate::event::EventFeed;
use crate::media::MediaStore;
use crate::platform::Platform;
use crate::router::ApiRouter;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tracing::info;

// ============================================================================
// 1. 会话
// ============================================================================

pub struct BotSession {
    account_id: i64,
    router: ApiRouter,
    feed: EventFeed,
    config: SessionConfig,
}

impl BotSession {
    pub fn new(
        platform: Arc<dyn Platform>,
        config: SessionConfig,
        data_dir: &Path,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        let account_id = platform.account_id();
        let router = ApiRouter::new(platform, &config, data_dir);
        let feed = EventFeed::new(router.clone(), media, config.clone());
        Self {
            account_id,
            router,
            feed,
            config,
        }
    }

    pub fn account_id(&self) -> i64 {
        self.account_id
    }

    pub fn router(&self) -> &ApiRouter {
        &self.router
    }

    pub fn feed(&self) -> &EventFeed {
        &self.feed
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

// ============================================================================
// 2. 注册表
// ============================================================================

/// 账号 ID -> 会话
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<i64, Arc<BotSession>>>,
}

static GLOBAL: OnceLock<SessionManager> = OnceLock::new();

/// 进程级注册表
pub fn global() -> &'static SessionManager {
    GLOBAL.get_or_init(SessionManager::new)
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册会话，账号已存在时保留原会话并返回它
    pub async fn register(&self, session: BotSession) -> Arc<BotSession> {
        let mut map = self.sessions.write().await;
        let account_id = session.account_id();
        if let Some(existing) = map.get(&account_id) {
            info!(target: "Session", "{} 已存在", account_id);
            return existing.clone();
        }

        let session = Arc::new(session);
        map.insert(account_id, session.clone());
        info!(target: "Session", "账号 {} 的会话已创建", account_id);
        session
    }

    pub async fn get(&self, account_id: i64) -> Option<Arc<BotSession>> {
        self.sessions.read().await.get(&account_id).cloned()
    }

    pub async fn contains(&self, account_id: i64) -> bool {
        self.sessions.read().await.contains_key(&account_id)
    }

    /// 关闭会话，缓存随会话一同释放
    pub async fn close(&self, account_id: i64) -> bool {
        let removed = self.sessions.write().await.remove(&account_id);
        if removed.is_some() {
            info!(target: "Session", "账号 {} 的会话已关闭", account_id);
        }
        removed.is_some()
    }

    pub async fn close_all(&self) {
        let ids = self.account_ids().await;
        for id in ids {
            self.close(id).await;
        }
    }

    pub async fn account_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.sessions.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FsMediaStore;
    use crate::platform::memory::MemoryPlatform;

    fn session(account_id: i64) -> BotSession {
        let platform = Arc::new(MemoryPlatform::new(account_id, "bot"));
        let dir = std::env::temp_dir();
        BotSession::new(
            platform,
            SessionConfig::default(),
            &dir,
            Arc::new(FsMediaStore::new(&dir)),
        )
    }

    #[tokio::test]
    async fn register_keeps_the_first_session() {
        let manager = SessionManager::new();
        let first = manager.register(session(1)).await;
        first.router().temp_contacts().record(5, 50);

        let second = manager.register(session(1)).await;
        assert_eq!(second.router().temp_contacts().group_of(5), Some(50));
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn close_removes_sessions() {
        let manager = SessionManager::new();
        manager.register(session(1)).await;
        manager.register(session(2)).await;
        assert_eq!(manager.account_ids().await, vec![1, 2]);

        assert!(manager.close(1).await);
        assert!(!manager.close(1).await);
        manager.close_all().await;
        assert!(manager.is_empty().await);
    }
}
