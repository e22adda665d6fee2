use super::ApiRouter;
use crate::error::{ActionError, ActionResult, ParamError};
use crate::params::{ParamMap, ParamsExt};
use crate::response::Payload;

/// 默认禁言时长 (秒)
pub(super) const DEFAULT_BAN_DURATION: i64 = 30 * 60;

impl ApiRouter {
    pub(super) async fn set_group_kick(&self, p: &ParamMap) -> ActionResult<Payload> {
        let (group_id, user_id) = member_target(p)?;
        self.platform().kick(group_id, user_id).await?;
        Ok(Payload::None)
    }

    /// 禁言，`duration` 为 0 时解除禁言
    pub(super) async fn set_group_ban(&self, p: &ParamMap) -> ActionResult<Payload> {
        let (group_id, user_id) = member_target(p)?;
        let duration = p.long("duration")?.unwrap_or(DEFAULT_BAN_DURATION);

        if duration == 0 {
            self.platform().unmute(group_id, user_id).await?;
        } else {
            let seconds = u32::try_from(duration).map_err(|_| ParamError::IllTyped {
                key: "duration",
                expected: "非负整数",
            })?;
            self.platform().mute(group_id, user_id, seconds).await?;
        }
        Ok(Payload::None)
    }

    pub(super) async fn set_group_whole_ban(&self, p: &ParamMap) -> ActionResult<Payload> {
        let group_id = p.require_long("group_id")?;
        let enable = p.boolean_or("enable", true);
        self.platform().set_mute_all(group_id, enable).await?;
        Ok(Payload::None)
    }

    /// 平台无法修改成员身份
    pub(super) fn set_group_admin(&self, p: &ParamMap) -> ActionResult<Payload> {
        let (group_id, user_id) = member_target(p)?;
        Err(ActionError::Rejected(format!(
            "无法设置群 {} 成员 {} 的管理员身份",
            group_id, user_id
        )))
    }

    pub(super) async fn set_group_card(&self, p: &ParamMap) -> ActionResult<Payload> {
        let (group_id, user_id) = member_target(p)?;
        let card = p.text("card").unwrap_or_default();
        self.platform().set_name_card(group_id, user_id, &card).await?;
        Ok(Payload::None)
    }

    /// 退出群聊，不支持解散
    pub(super) async fn set_group_leave(&self, p: &ParamMap) -> ActionResult<Payload> {
        let group_id = p.require_long("group_id")?;
        let dismiss = p.boolean_or("is_dismiss", false) || p.boolean_or("enable", false);
        if dismiss {
            return Err(ActionError::Rejected(format!("无法解散群 {}", group_id)));
        }
        self.platform().quit_group(group_id).await?;
        Ok(Payload::None)
    }

    pub(super) async fn set_group_special_title(&self, p: &ParamMap) -> ActionResult<Payload> {
        let (group_id, user_id) = member_target(p)?;
        let title = p.text("special_title").unwrap_or_default();
        self.platform()
            .set_special_title(group_id, user_id, &title)
            .await?;
        Ok(Payload::None)
    }

    pub(super) async fn set_group_name(&self, p: &ParamMap) -> ActionResult<Payload> {
        let group_id = p.require_long("group_id")?;
        let name = non_empty_text(p, "name")?;
        self.platform().set_group_name(group_id, &name).await?;
        Ok(Payload::None)
    }

    pub(super) async fn set_group_announcement(&self, p: &ParamMap) -> ActionResult<Payload> {
        let group_id = p.require_long("group_id")?;
        let content = non_empty_text(p, "content")?;
        self.platform().post_announcement(group_id, &content).await?;
        Ok(Payload::None)
    }
}

/// 读取 `group_id` 与 `user_id`
pub(super) fn member_target(p: &ParamMap) -> Result<(i64, i64), ParamError> {
    Ok((p.require_long("group_id")?, p.require_long("user_id")?))
}

fn non_empty_text(p: &ParamMap, key: &'static str) -> Result<String, ParamError> {
    p.text(key)
        .filter(|s| !s.is_empty())
        .ok_or(ParamError::Missing(key))
}
