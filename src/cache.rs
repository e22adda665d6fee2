//! 关联缓存
//!
//! 协议只能回传很小的标识 (消息 ID、申请 flag、QQ 号)，而平台需要原始句柄才能继续操作。
//! 这里的缓存是两者之间唯一的桥梁。每个缓存各自持有一把互斥锁，互不关联。

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod contact;
pub mod request;
pub mod source;

pub use contact::TempContactCache;
pub use request::{PendingRequest, PendingRequestCache, PendingSlot};
pub use source::MessageSourceCache;

/// 获取锁，忽略中毒状态 (缓存内容在任意时刻都是一致的)
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
