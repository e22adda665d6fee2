use super::lock;
use std::collections::HashMap;
use std::sync::Mutex;

/// 临时会话来源缓存
///
/// 记录通过群发起临时会话的用户及其所在群 (QQ : GroupId)，供私聊发送时回退使用。
#[derive(Default)]
pub struct TempContactCache {
    entries: Mutex<HashMap<i64, i64>>,
}

impl TempContactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, user_id: i64, group_id: i64) {
        lock(&self.entries).insert(user_id, group_id);
    }

    pub fn group_of(&self, user_id: i64) -> Option<i64> {
        lock(&self.entries).get(&user_id).copied()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_group_wins() {
        let cache = TempContactCache::new();
        assert!(cache.group_of(1).is_none());
        cache.record(1, 10);
        cache.record(1, 20);
        assert_eq!(cache.group_of(1), Some(20));
        assert_eq!(cache.len(), 1);
    }
}
