//! 动作路由
//!
//! 把 `(action, params)` 分发到具体的处理方法，并把所有结果折叠为一个 [`ResponseEnvelope`]。
//! 处理方法按动作族拆分在子模块中：
//!
//! - [`message`]: 消息发送与撤回
//! - [`group`]: 群管理
//! - [`request`]: 好友/加群申请处理
//! - [`info`]: 信息查询、能力查询与不支持的动作
//! - [`quick`]: 快速操作

use crate::cache::{MessageSourceCache, PendingRequestCache, TempContactCache};
use crate::config::SessionConfig;
use crate::error::{ActionError, ActionResult};
use crate::params::ParamMap;
use crate::platform::Platform;
use crate::response::{ApiRequest, Payload, ResponseEnvelope};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};

mod group;
mod info;
mod message;
mod quick;
mod request;

/// 后台执行的动作后缀
const ASYNC_SUFFIX: &str = "_async";

/// 路由器识别的全部动作名
const ACTIONS: &[&str] = &[
    "send_msg",
    "send_private_msg",
    "send_group_msg",
    "send_discuss_msg",
    "delete_msg",
    "send_like",
    "set_group_kick",
    "set_group_ban",
    "set_group_anonymous_ban",
    "set_group_whole_ban",
    "set_group_admin",
    "set_group_anonymous",
    "set_group_card",
    "set_group_leave",
    "set_group_special_title",
    "set_discuss_leave",
    "set_friend_add_request",
    "set_group_add_request",
    "get_login_info",
    "get_stranger_info",
    "get_friend_list",
    "get_group_list",
    "get_group_info",
    "get_group_member_info",
    "get_group_member_list",
    "get_cookies",
    "get_csrf_token",
    "get_credentials",
    "get_record",
    "get_image",
    "can_send_image",
    "can_send_record",
    "get_status",
    "get_version_info",
    "set_restart_plugin",
    "clean_data_dir",
    "clean_plugin_log",
    ".handle_quick_operation",
    "set_group_name",
    "_set_group_announcement",
];

/// 动作名是否在动作表中
pub fn is_known_action(action: &str) -> bool {
    ACTIONS.contains(&action)
}

// ============================================================================
// 1. 路由器
// ============================================================================

struct RouterState {
    platform: Arc<dyn Platform>,
    sources: MessageSourceCache,
    requests: PendingRequestCache,
    temp_contacts: TempContactCache,
    data_dir: PathBuf,
}

/// 动作路由器
///
/// 每个登录账号持有一个实例，克隆开销很小 (共享同一组缓存)。
#[derive(Clone)]
pub struct ApiRouter {
    state: Arc<RouterState>,
}

impl ApiRouter {
    pub fn new(
        platform: Arc<dyn Platform>,
        config: &SessionConfig,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            state: Arc::new(RouterState {
                platform,
                sources: MessageSourceCache::new(config.cache_source_size),
                requests: PendingRequestCache::new(),
                temp_contacts: TempContactCache::new(),
                data_dir: data_dir.into(),
            }),
        }
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.state.platform
    }

    pub fn account_id(&self) -> i64 {
        self.state.platform.account_id()
    }

    pub fn sources(&self) -> &MessageSourceCache {
        &self.state.sources
    }

    pub fn requests(&self) -> &PendingRequestCache {
        &self.state.requests
    }

    pub fn temp_contacts(&self) -> &TempContactCache {
        &self.state.temp_contacts
    }

    pub fn data_dir(&self) -> &Path {
        &self.state.data_dir
    }

    // ========================================================================
    // 2. 入口
    // ========================================================================

    /// 执行一次动作调用
    ///
    /// 以 `_async` 结尾的已知动作在后台任务中执行，立即返回 [`ResponseEnvelope::AsyncAccepted`]。
    pub async fn dispatch(&self, action: &str, params: &ParamMap) -> ResponseEnvelope {
        if let Some(base) = action.strip_suffix(ASYNC_SUFFIX) {
            if !is_known_action(base) {
                warn!(target: "Router", "未知动作: {}", action);
                return ResponseEnvelope::malformed();
            }
            let router = self.clone();
            let action = base.to_string();
            let params = params.clone();
            tokio::spawn(async move {
                let envelope = router.invoke(&action, &params).await;
                debug!(target: "Router", "后台动作 {} 完成: {}", action, envelope.status());
            });
            return ResponseEnvelope::async_accepted();
        }

        self.invoke(action, params).await
    }

    /// 处理一帧 JSON 请求，返回 JSON 响应
    pub async fn handle_frame(&self, frame: &str) -> String {
        let request: ApiRequest = match serde_json::from_str(frame) {
            Ok(r) => r,
            Err(e) => {
                debug!(target: "Router", "无法解析请求帧: {}", e);
                return ResponseEnvelope::malformed()
                    .into_response(None)
                    .to_json_string();
            }
        };

        self.dispatch(&request.action, &request.params)
            .await
            .into_response(request.echo)
            .to_json_string()
    }

    /// 执行动作并把错误与 panic 转换为信封
    async fn invoke(&self, action: &str, params: &ParamMap) -> ResponseEnvelope {
        match AssertUnwindSafe(self.route(action, params))
            .catch_unwind()
            .await
        {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(err)) => envelope_for(action, err),
            Err(_) => {
                error!(target: "Router", "动作 {} 执行时发生 panic", action);
                ResponseEnvelope::failure()
            }
        }
    }

    // ========================================================================
    // 3. 动作表
    // ========================================================================

    async fn route(&self, action: &str, p: &ParamMap) -> ActionResult<ResponseEnvelope> {
        if !is_known_action(action) {
            warn!(target: "Router", "未知动作: {}", action);
            return Ok(ResponseEnvelope::malformed());
        }

        let payload = match action {
            // 消息
            "send_msg" => self.send_msg(p).await?,
            "send_private_msg" => self.send_private_msg(p).await?,
            "send_group_msg" => self.send_group_msg(p).await?,
            "delete_msg" => self.delete_msg(p).await?,

            // 群管理
            "set_group_kick" => self.set_group_kick(p).await?,
            "set_group_ban" => self.set_group_ban(p).await?,
            "set_group_whole_ban" => self.set_group_whole_ban(p).await?,
            "set_group_admin" => self.set_group_admin(p)?,
            "set_group_card" => self.set_group_card(p).await?,
            "set_group_leave" => self.set_group_leave(p).await?,
            "set_group_special_title" => self.set_group_special_title(p).await?,
            "set_group_name" => self.set_group_name(p).await?,
            "_set_group_announcement" => self.set_group_announcement(p).await?,

            // 申请
            "set_friend_add_request" => self.set_friend_add_request(p).await?,
            "set_group_add_request" => self.set_group_add_request(p).await?,

            // 查询
            "get_login_info" => self.get_login_info(),
            "get_friend_list" => self.get_friend_list().await?,
            "get_group_list" => self.get_group_list().await?,
            "get_group_info" => self.get_group_info(p).await?,
            "get_group_member_info" => self.get_group_member_info(p).await?,
            "get_group_member_list" => self.get_group_member_list(p).await?,
            "can_send_image" | "can_send_record" => info::can_send(),
            "get_status" => self.get_status(),
            "get_version_info" => self.get_version_info(),

            // 生命周期
            "set_restart_plugin" | "clean_data_dir" | "clean_plugin_log" => Payload::None,

            "get_record" | "get_image" | "get_cookies" | "get_csrf_token" | "get_credentials"
            | "get_stranger_info" | "send_discuss_msg" | "set_group_anonymous"
            | "set_group_anonymous_ban" | "set_discuss_leave" | "send_like" => {
                return Err(info::unsupported(action));
            }

            ".handle_quick_operation" => return self.handle_quick_operation(p).await,

            _ => return Err(anyhow::anyhow!("动作 {} 没有处理方法", action).into()),
        };

        Ok(ResponseEnvelope::success(payload))
    }
}

// ============================================================================
// 4. 错误折叠
// ============================================================================

/// 把处理错误转换为信封，转换本身不会失败
pub(crate) fn envelope_for(action: &str, err: ActionError) -> ResponseEnvelope {
    match err {
        ActionError::Param(_) | ActionError::SourceNotFound(_) | ActionError::Malformed(_) => {
            debug!(target: "Router", "{} 请求无效: {}", action, err);
            ResponseEnvelope::malformed()
        }
        ActionError::Platform(ref e) if e.is_permission_denied() => {
            debug!(target: "Router", "机器人无操作权限, 调用的动作: /{}", action);
            ResponseEnvelope::rejected()
        }
        ActionError::Rejected(_) => {
            debug!(target: "Router", "{} 被拒绝: {}", action, err);
            ResponseEnvelope::rejected()
        }
        ActionError::Platform(_) | ActionError::NoRoute(_) | ActionError::Internal(_) => {
            error!(target: "Router", "{} 执行失败: {}", action, err);
            ResponseEnvelope::failure()
        }
    }
}
