use super::ApiRouter;
use crate::error::{ActionError, ActionResult, ParamError};
use crate::message::MessageChain;
use crate::params::{ParamMap, ParamsExt};
use crate::platform::Contact;
use crate::response::{MessageIdData, Payload};
use tracing::debug;

impl ApiRouter {
    /// 发送消息
    ///
    /// 显式的 `message_type` 优先；缺失时依次检查 `user_id`、`group_id`、`discuss_id`，取第一个存在的。
    pub(super) async fn send_msg(&self, p: &ParamMap) -> ActionResult<Payload> {
        if p.contains_key("message_type") {
            return match p.text("message_type").as_deref() {
                Some("private") => self.send_private_msg(p).await,
                Some("group") => self.send_group_msg(p).await,
                other => Err(ActionError::Malformed(format!(
                    "不支持的消息类型: {}",
                    other.unwrap_or("null")
                ))),
            };
        }

        if p.is_present("user_id") {
            self.send_private_msg(p).await
        } else if p.is_present("group_id") || p.is_present("discuss_id") {
            self.send_group_msg(p).await
        } else {
            Err(ActionError::Malformed("无法推断消息目标".into()))
        }
    }

    pub(super) async fn send_group_msg(&self, p: &ParamMap) -> ActionResult<Payload> {
        let group_id = p.require_long("group_id")?;
        let chain = message_chain(p)?;
        self.send_to(Contact::Group(group_id), &chain).await
    }

    pub(super) async fn send_private_msg(&self, p: &ParamMap) -> ActionResult<Payload> {
        let user_id = p.require_long("user_id")?;
        let chain = message_chain(p)?;
        let target = self.resolve_private(user_id).await?;
        self.send_to(target, &chain).await
    }

    /// 撤回消息，消息 ID 必须仍在缓存中
    pub(super) async fn delete_msg(&self, p: &ParamMap) -> ActionResult<Payload> {
        let message_id = p.int("message_id")?.ok_or(ParamError::Missing("message_id"))?;
        let handle = self.sources().get(message_id)?;
        self.platform().recall(&handle).await?;
        Ok(Payload::None)
    }

    /// 私聊目标：好友 > 临时会话缓存 > 遍历已加入的群
    async fn resolve_private(&self, user_id: i64) -> ActionResult<Contact> {
        let platform = self.platform();
        if platform.friend(user_id).await?.is_some() {
            return Ok(Contact::Friend(user_id));
        }

        if let Some(group_id) = self.temp_contacts().group_of(user_id) {
            return Ok(Contact::Member { group_id, user_id });
        }

        for group in platform.groups().await? {
            let members = match platform.members(group.id).await {
                Ok(members) => members,
                Err(e) => {
                    debug!(target: "Router", "跳过群 {}: {}", group.id, e);
                    continue;
                }
            };
            if members.iter().any(|m| m.user_id == user_id) {
                debug!(target: "Router", "用户 {} 通过群 {} 发起临时会话", user_id, group.id);
                return Ok(Contact::Member {
                    group_id: group.id,
                    user_id,
                });
            }
        }

        Err(ActionError::NoRoute(user_id))
    }

    /// 发送并登记撤回句柄
    async fn send_to(&self, target: Contact, chain: &MessageChain) -> ActionResult<Payload> {
        let handle = self.platform().send_message(target, chain).await?;
        let message_id = handle.id;
        self.sources().add(handle);
        debug!(target: "Router", "消息 #{} 已发送 -> {:?}", message_id, target);
        Ok(Payload::MessageId(MessageIdData { message_id }))
    }
}

/// 读取 `message` 与 `auto_escape`，内容为空视为无效请求
fn message_chain(p: &ParamMap) -> ActionResult<MessageChain> {
    let auto_escape = p.boolean_or("auto_escape", false);
    MessageChain::from_wire(p.value("message"), auto_escape)
        .ok_or_else(|| ActionError::Malformed("消息内容为空".into()))
}
