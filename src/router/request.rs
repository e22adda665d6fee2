use super::ApiRouter;
use crate::cache::{PendingRequest, PendingSlot};
use crate::error::{ActionError, ActionResult, ParamError, PlatformResult};
use crate::params::{ParamMap, ParamsExt};
use crate::response::Payload;
use std::sync::Arc;
use tracing::{debug, info};

impl ApiRouter {
    /// 处理好友申请
    ///
    /// flag 不在缓存中时按已处理对待，仍然返回成功。
    pub(super) async fn set_friend_add_request(&self, p: &ParamMap) -> ActionResult<Payload> {
        let flag = read_flag(p)?;
        let approve = p.boolean_or("approve", true);
        let remark = p.text("remark");

        let Some(slot) = self.pending(flag) else {
            return Ok(Payload::None);
        };
        let PendingRequest::Friend(request) = slot.request() else {
            debug!(target: "Router", "申请 {} 不是好友申请，忽略", flag);
            return Ok(Payload::None);
        };

        claim(&slot, flag)?;
        let result = self
            .platform()
            .resolve_friend_request(request, approve, remark.as_deref())
            .await;
        settle(&slot, flag, approve, result)
    }

    /// 处理加群申请
    pub(super) async fn set_group_add_request(&self, p: &ParamMap) -> ActionResult<Payload> {
        let flag = read_flag(p)?;
        let approve = p.boolean_or("approve", true);
        let reason = p.text("reason");

        let Some(slot) = self.pending(flag) else {
            return Ok(Payload::None);
        };
        let PendingRequest::GroupJoin(request) = slot.request() else {
            debug!(target: "Router", "申请 {} 不是加群申请，忽略", flag);
            return Ok(Payload::None);
        };

        claim(&slot, flag)?;
        let result = self
            .platform()
            .resolve_join_request(request, approve, reason.as_deref())
            .await;
        settle(&slot, flag, approve, result)
    }

    fn pending(&self, flag: i64) -> Option<Arc<PendingSlot>> {
        let slot = self.requests().get(Some(flag));
        if slot.is_none() {
            debug!(target: "Router", "申请 {} 不在缓存中，按已处理对待", flag);
        }
        slot
    }
}

/// flag 必须存在且为数字
fn read_flag(p: &ParamMap) -> Result<i64, ParamError> {
    p.require_long("flag")
}

fn claim(slot: &PendingSlot, flag: i64) -> ActionResult<()> {
    if slot.try_claim() {
        Ok(())
    } else {
        Err(ActionError::Rejected(format!("申请 {} 已被处理", flag)))
    }
}

/// 平台调用失败时归还处理权，允许调用方重试
fn settle(
    slot: &PendingSlot,
    flag: i64,
    approve: bool,
    result: PlatformResult<()>,
) -> ActionResult<Payload> {
    if let Err(e) = result {
        slot.release();
        return Err(e.into());
    }
    info!(
        target: "Router",
        "申请 {} 已{}",
        flag,
        if approve { "同意" } else { "拒绝" }
    );
    Ok(Payload::None)
}
