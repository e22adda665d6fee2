use super::ApiRouter;
use super::group::member_target;
use crate::error::{ActionError, ActionResult};
use crate::params::{ParamMap, ParamsExt};
use crate::platform::Member;
use crate::response::{
    CanSendData, FriendData, GroupData, GroupInfo, LoginInfo, MemberInfo, Payload, PluginStatus,
    VersionInfo,
};

impl ApiRouter {
    pub(super) fn get_login_info(&self) -> Payload {
        let platform = self.platform();
        Payload::LoginInfo(LoginInfo {
            user_id: platform.account_id(),
            nickname: platform.nickname(),
        })
    }

    pub(super) async fn get_friend_list(&self) -> ActionResult<Payload> {
        let friends = self.platform().friends().await?;
        Ok(Payload::FriendList(
            friends
                .into_iter()
                .map(|f| FriendData {
                    user_id: f.id,
                    nickname: f.nickname,
                    remark: f.remark,
                })
                .collect(),
        ))
    }

    pub(super) async fn get_group_list(&self) -> ActionResult<Payload> {
        let groups = self.platform().groups().await?;
        Ok(Payload::GroupList(
            groups
                .into_iter()
                .map(|g| GroupData {
                    group_id: g.id,
                    group_name: g.name,
                })
                .collect(),
        ))
    }

    /// 群信息，人数包含机器人自身，群容量未知记为 0
    pub(super) async fn get_group_info(&self, p: &ParamMap) -> ActionResult<Payload> {
        let group_id = p.require_long("group_id")?;
        let platform = self.platform();
        let group = platform.group(group_id).await?;
        let self_id = platform.account_id();
        let others = platform
            .members(group_id)
            .await?
            .iter()
            .filter(|m| m.user_id != self_id)
            .count();

        Ok(Payload::GroupInfo(GroupInfo {
            group_id: group.id,
            group_name: group.name,
            member_count: i32::try_from(others + 1).unwrap_or(i32::MAX),
            max_member_count: 0,
        }))
    }

    pub(super) async fn get_group_member_info(&self, p: &ParamMap) -> ActionResult<Payload> {
        let (group_id, user_id) = member_target(p)?;
        let member = self.platform().member(group_id, user_id).await?;
        Ok(Payload::MemberInfo(member_info(&member)))
    }

    /// 群成员列表，保证机器人自身恰好出现一次
    pub(super) async fn get_group_member_list(&self, p: &ParamMap) -> ActionResult<Payload> {
        let group_id = p.require_long("group_id")?;
        let platform = self.platform();
        let self_id = platform.account_id();

        let mut members = platform.members(group_id).await?;
        if !members.iter().any(|m| m.user_id == self_id) {
            members.push(platform.self_member(group_id).await?);
        }

        Ok(Payload::MemberList(members.iter().map(member_info).collect()))
    }

    pub(super) fn get_status(&self) -> Payload {
        let online = self.platform().is_online();
        Payload::Status(PluginStatus {
            app_initialized: true,
            app_enabled: true,
            plugins_good: true,
            app_good: true,
            online,
            good: online,
        })
    }

    pub(super) fn get_version_info(&self) -> Payload {
        Payload::Version(VersionInfo {
            coolq_directory: self.data_dir().display().to_string(),
            coolq_edition: "pro".to_string(),
            plugin_version: env!("CARGO_PKG_VERSION").to_string(),
            plugin_build_number: String::new(),
            plugin_build_configuration: "release".to_string(),
        })
    }
}

pub(super) fn can_send() -> Payload {
    Payload::CanSend(CanSendData { yes: true })
}

/// 平台不支持的动作，不做任何平台调用
pub(super) fn unsupported(action: &str) -> ActionError {
    ActionError::Rejected(format!("{} 暂不支持", action))
}

/// 平台成员 -> 协议成员信息
pub(crate) fn member_info(member: &Member) -> MemberInfo {
    MemberInfo {
        group_id: member.group_id,
        user_id: member.user_id,
        nickname: member.nickname.clone(),
        card: member.card.clone(),
        sex: "unknown".to_string(),
        age: 0,
        area: String::new(),
        join_time: member.join_time,
        last_sent_time: member.last_speak_time,
        level: String::new(),
        role: member.role.as_str().to_string(),
        unfriendly: false,
        title: member.special_title.clone(),
        title_expire_time: 0,
        card_changeable: member.role.is_operator(),
    }
}
