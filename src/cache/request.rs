use super::lock;
use crate::platform::{FriendAddRequest, GroupJoinRequest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// 待处理的申请
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRequest {
    Friend(FriendAddRequest),
    GroupJoin(GroupJoinRequest),
}

impl PendingRequest {
    /// 协议中使用的 flag，取自事件自身的 ID
    pub fn flag(&self) -> i64 {
        match self {
            Self::Friend(r) => r.event_id,
            Self::GroupJoin(r) => r.event_id,
        }
    }
}

/// 缓存条目
///
/// 平台的 accept/reject 只能调用一次，`resolved` 保证同一条申请不会被处理两次。
#[derive(Debug)]
pub struct PendingSlot {
    request: PendingRequest,
    resolved: AtomicBool,
}

impl PendingSlot {
    fn new(request: PendingRequest) -> Self {
        Self {
            request,
            resolved: AtomicBool::new(false),
        }
    }

    pub fn request(&self) -> &PendingRequest {
        &self.request
    }

    /// 抢占处理权，已被处理过时返回 false
    pub fn try_claim(&self) -> bool {
        !self.resolved.swap(true, Ordering::SeqCst)
    }

    /// 平台调用失败时归还处理权
    pub fn release(&self) {
        self.resolved.store(false, Ordering::SeqCst);
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::SeqCst)
    }
}

/// 申请缓存
///
/// 没有容量上限，也不会主动淘汰；条目一直保留到进程结束。
pub struct PendingRequestCache {
    entries: Mutex<HashMap<i64, Arc<PendingSlot>>>,
}

impl PendingRequestCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn put(&self, flag: i64, request: PendingRequest) {
        lock(&self.entries).insert(flag, Arc::new(PendingSlot::new(request)));
    }

    /// 以事件 ID 作为 flag 写入
    pub fn add(&self, request: PendingRequest) {
        self.put(request.flag(), request);
    }

    /// 查找申请，flag 缺失或无法解析 (None) 视为未命中
    pub fn get(&self, flag: Option<i64>) -> Option<Arc<PendingSlot>> {
        let flag = flag?;
        lock(&self.entries).get(&flag).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingRequestCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn friend(event_id: i64) -> PendingRequest {
        PendingRequest::Friend(FriendAddRequest {
            event_id,
            from_id: 100,
            from_nick: "alice".into(),
            message: "hi".into(),
        })
    }

    #[test]
    fn add_uses_event_id_as_flag() {
        let cache = PendingRequestCache::new();
        cache.add(friend(77));
        assert_eq!(cache.len(), 1);
        let slot = cache.get(Some(77)).unwrap();
        assert_eq!(slot.request().flag(), 77);
    }

    #[test]
    fn missing_flag_is_a_miss() {
        let cache = PendingRequestCache::new();
        cache.add(friend(1));
        assert!(cache.get(None).is_none());
        assert!(cache.get(Some(2)).is_none());
    }

    #[test]
    fn slot_can_only_be_claimed_once_until_released() {
        let cache = PendingRequestCache::new();
        cache.add(friend(5));
        let slot = cache.get(Some(5)).unwrap();

        assert!(slot.try_claim());
        assert!(slot.is_resolved());
        assert!(!cache.get(Some(5)).unwrap().try_claim());

        slot.release();
        assert!(slot.try_claim());
    }

    #[test]
    fn resolved_entries_stay_cached() {
        let cache = PendingRequestCache::new();
        for id in 0..10 {
            cache.add(friend(id));
        }
        assert!(cache.get(Some(3)).unwrap().try_claim());
        assert_eq!(cache.len(), 10);
        assert!(cache.get(Some(3)).unwrap().is_resolved());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_have_one_winner() {
        let cache = Arc::new(PendingRequestCache::new());
        cache.add(friend(11));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                cache.get(Some(11)).is_some_and(|slot| slot.try_claim())
            }));
        }
        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
