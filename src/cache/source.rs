use super::lock;
use crate::error::SourceNotFound;
use crate::platform::RecallHandle;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

/// 默认容量
pub const DEFAULT_CAPACITY: usize = 512;

#[derive(Default)]
struct SourceQueue {
    // 插入顺序，覆盖写入不会改变位置
    order: VecDeque<i32>,
    entries: HashMap<i32, RecallHandle>,
}

/// 撤回句柄缓存
///
/// 按插入顺序淘汰：超过容量时移除最早插入的条目，读取不会刷新顺序。
pub struct MessageSourceCache {
    inner: Mutex<SourceQueue>,
    capacity: usize,
}

impl MessageSourceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(SourceQueue::default()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 写入句柄，超出容量时淘汰最早的条目
    pub fn put(&self, id: i32, handle: RecallHandle) {
        let mut queue = lock(&self.inner);
        if queue.entries.insert(id, handle).is_none() {
            queue.order.push_back(id);
        }

        while queue.entries.len() > self.capacity {
            let Some(oldest) = queue.order.pop_front() else {
                break;
            };
            queue.entries.remove(&oldest);
            debug!(target: "Cache", "淘汰消息句柄 {}", oldest);
        }
    }

    /// 以句柄自身的消息 ID 写入
    pub fn add(&self, handle: RecallHandle) {
        self.put(handle.id, handle);
    }

    /// 读取句柄，不存在或已被淘汰时返回 [`SourceNotFound`]
    pub fn get(&self, id: i32) -> Result<RecallHandle, SourceNotFound> {
        lock(&self.inner)
            .entries
            .get(&id)
            .cloned()
            .ok_or(SourceNotFound(id))
    }

    pub fn contains(&self, id: i32) -> bool {
        lock(&self.inner).entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按插入顺序列出当前的消息 ID
    pub fn ids(&self) -> Vec<i32> {
        lock(&self.inner).order.iter().copied().collect()
    }
}

impl Default for MessageSourceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
