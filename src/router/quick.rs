//! 快速操作
//!
//! 上报事件的接收方可以在响应中描述想要的反应 (回复、撤回、踢出、禁言、处理申请)，
//! 这里把它改写为等价的普通动作调用。`context` 与事件上报的结构相同。

use super::{ApiRouter, envelope_for, info};
use crate::error::ActionResult;
use crate::message::prefix_at;
use crate::params::{ParamMap, ParamsExt, as_param_map};
use crate::response::{Payload, ResponseEnvelope};
use serde_json::Value;

impl ApiRouter {
    pub(super) async fn handle_quick_operation(
        &self,
        p: &ParamMap,
    ) -> ActionResult<ResponseEnvelope> {
        let Some(context) = as_param_map(p.value("context")) else {
            return Ok(ResponseEnvelope::malformed());
        };
        let empty = ParamMap::new();
        let operation = as_param_map(p.value("operation")).unwrap_or(&empty);

        let envelope = match context.text("post_type").as_deref() {
            Some("message") => self.quick_message(context, operation).await,
            Some("request") => self.quick_request(context, operation).await,
            _ => ResponseEnvelope::malformed(),
        };
        Ok(envelope)
    }

    async fn quick_message(&self, context: &ParamMap, operation: &ParamMap) -> ResponseEnvelope {
        let is_group = context.text("message_type").as_deref() == Some("group");

        if let Some(reply) = operation.value("reply") {
            let auto_escape = operation.boolean_or("auto_escape", false);
            let sender = context.long("user_id").ok().flatten();
            let message = match sender {
                Some(user_id) if is_group && operation.boolean_or("at_sender", false) => {
                    prefix_at(reply, user_id, auto_escape)
                }
                _ => reply.clone(),
            };

            let mut next = context.clone();
            next.insert("message".into(), message);
            next.insert("auto_escape".into(), Value::Bool(auto_escape));
            return settle("send_msg", self.send_msg(&next).await);
        }

        if !is_group {
            return ResponseEnvelope::malformed();
        }

        // 按 delete > kick > ban 的顺序只执行一项
        if operation.boolean_or("delete", false) {
            return settle("delete_msg", self.delete_msg(context).await);
        }
        if operation.boolean_or("kick", false) {
            return settle("set_group_kick", self.set_group_kick(context).await);
        }
        if operation.boolean_or("ban", false) {
            if context.is_present("anonymous") {
                let action = "set_group_anonymous_ban";
                return envelope_for(action, info::unsupported(action));
            }
            let mut next = context.clone();
            if let Some(duration) = operation.value("ban_duration") {
                next.insert("duration".into(), duration.clone());
            }
            return settle("set_group_ban", self.set_group_ban(&next).await);
        }

        ResponseEnvelope::malformed()
    }

    async fn quick_request(&self, context: &ParamMap, operation: &ParamMap) -> ResponseEnvelope {
        let mut next = context.clone();
        next.insert(
            "approve".into(),
            Value::Bool(operation.boolean_or("approve", false)),
        );
        for key in ["remark", "reason"] {
            let value = operation.text(key).map(Value::String).unwrap_or(Value::Null);
            next.insert(key.into(), value);
        }

        match context.text("request_type").as_deref() {
            Some("friend") => settle(
                "set_friend_add_request",
                self.set_friend_add_request(&next).await,
            ),
            Some("group") => settle(
                "set_group_add_request",
                self.set_group_add_request(&next).await,
            ),
            _ => ResponseEnvelope::malformed(),
        }
    }
}

fn settle(action: &str, result: ActionResult<Payload>) -> ResponseEnvelope {
    match result {
        Ok(payload) => ResponseEnvelope::success(payload),
        Err(err) => envelope_for(action, err),
    }
}
