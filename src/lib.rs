// lib.rs
//
// ================================================================================
// cqhttp-bridge - CQHTTP 兼容网关
//
// 架构：动作路由 | 关联缓存 | 快速操作 | 会话注册表
// ================================================================================

pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod log;
pub mod media;
pub mod message;
pub mod params;
pub mod platform;
pub mod response;
pub mod router;
pub mod session;

pub mod prelude {
    pub use crate::cache::{MessageSourceCache, PendingRequest, PendingRequestCache};
    pub use crate::config::{AppConfig, ConfigManager, SessionConfig};
    pub use crate::error::{ActionError, ParamError, PlatformError, SourceNotFound};
    pub use crate::event::{EventFeed, InboundMessage, PlatformEvent};
    pub use crate::gateway::Gateway;
    pub use crate::media::{FsMediaStore, MediaStore};
    pub use crate::message::{Element, MessageChain};
    pub use crate::params::{ParamMap, ParamsExt};
    pub use crate::platform::{Contact, Platform, RecallHandle};
    pub use crate::response::{OutcomeClass, Payload, ResponseEnvelope};
    pub use crate::router::ApiRouter;
    pub use crate::session::{BotSession, SessionManager};
}
