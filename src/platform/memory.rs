//! 内存平台
//!
//! 不连接任何真实服务的 [`Platform`] 实现，用于控制台演示与测试。
//! 所有写操作都会记录为 [`PlatformCall`]，可通过 [`MemoryPlatform::calls`] 检查。

use super::{
    Contact, Friend, FriendAddRequest, Group, GroupJoinRequest, Member, MemberRole, Platform,
    RecallHandle,
};
use crate::error::{PlatformError, PlatformResult};
use crate::message::MessageChain;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// 平台收到的一次写操作
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Send {
        id: i32,
        target: Contact,
        chain: MessageChain,
    },
    Recall(i32),
    Kick {
        group_id: i64,
        user_id: i64,
    },
    Mute {
        group_id: i64,
        user_id: i64,
        seconds: u32,
    },
    Unmute {
        group_id: i64,
        user_id: i64,
    },
    MuteAll {
        group_id: i64,
        enabled: bool,
    },
    NameCard {
        group_id: i64,
        user_id: i64,
        card: String,
    },
    SpecialTitle {
        group_id: i64,
        user_id: i64,
        title: String,
    },
    GroupName {
        group_id: i64,
        name: String,
    },
    Quit(i64),
    Announcement {
        group_id: i64,
        content: String,
    },
    FriendRequest {
        event_id: i64,
        accept: bool,
        remark: Option<String>,
    },
    JoinRequest {
        event_id: i64,
        accept: bool,
        reason: Option<String>,
    },
}

struct GroupState {
    group: Group,
    self_role: MemberRole,
    // 不含机器人自身
    members: BTreeMap<i64, Member>,
}

#[derive(Default)]
struct State {
    friends: BTreeMap<i64, Friend>,
    groups: BTreeMap<i64, GroupState>,
    // 成员列表无法获取的群
    hidden_members: HashSet<i64>,
    recalled: HashSet<i32>,
    calls: Vec<PlatformCall>,
}

pub struct MemoryPlatform {
    account_id: i64,
    nickname: String,
    online: AtomicBool,
    broken: AtomicBool,
    next_message_id: AtomicI32,
    state: Mutex<State>,
}

impl MemoryPlatform {
    pub fn new(account_id: i64, nickname: impl Into<String>) -> Self {
        Self {
            account_id,
            nickname: nickname.into(),
            online: AtomicBool::new(true),
            broken: AtomicBool::new(false),
            next_message_id: AtomicI32::new(1),
            state: Mutex::new(State::default()),
        }
    }

    // ------------------------------------------------------------------------
    // 构建
    // ------------------------------------------------------------------------

    pub fn with_friend(mut self, user_id: i64, nickname: &str) -> Self {
        self.state_mut().friends.insert(
            user_id,
            Friend {
                id: user_id,
                nickname: nickname.to_string(),
                remark: String::new(),
            },
        );
        self
    }

    /// 添加群，`self_role` 为机器人在该群中的身份
    pub fn with_group(mut self, group_id: i64, name: &str, self_role: MemberRole) -> Self {
        self.state_mut().groups.insert(
            group_id,
            GroupState {
                group: Group {
                    id: group_id,
                    name: name.to_string(),
                },
                self_role,
                members: BTreeMap::new(),
            },
        );
        self
    }

    /// 向已有的群添加成员，群不存在时忽略
    pub fn with_member(mut self, group_id: i64, user_id: i64, nickname: &str, role: MemberRole) -> Self {
        if let Some(group) = self.state_mut().groups.get_mut(&group_id) {
            group.members.insert(
                user_id,
                Member {
                    group_id,
                    user_id,
                    nickname: nickname.to_string(),
                    role,
                    ..Default::default()
                },
            );
        }
        self
    }

    fn state_mut(&mut self) -> &mut State {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------------
    // 状态控制与检查
    // ------------------------------------------------------------------------

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// 之后的所有平台调用都以通信失败返回
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    /// 之后获取该群成员列表时以通信失败返回
    pub fn hide_members(&self, group_id: i64) {
        self.state().hidden_members.insert(group_id);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state().calls.clone()
    }

    /// 已发送的消息 (按发送顺序)
    pub fn sent(&self) -> Vec<(Contact, MessageChain)> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                PlatformCall::Send { target, chain, .. } => Some((*target, chain.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn is_friend(&self, user_id: i64) -> bool {
        self.state().friends.contains_key(&user_id)
    }

    pub fn is_member(&self, group_id: i64, user_id: i64) -> bool {
        self.state()
            .groups
            .get(&group_id)
            .is_some_and(|g| g.members.contains_key(&user_id))
    }

    // ------------------------------------------------------------------------
    // 内部工具
    // ------------------------------------------------------------------------

    fn check(&self) -> PlatformResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(PlatformError::Transport("连接已断开".into()));
        }
        Ok(())
    }

    fn self_member_of(&self, group: &GroupState) -> Member {
        Member {
            group_id: group.group.id,
            user_id: self.account_id,
            nickname: self.nickname.clone(),
            role: group.self_role,
            ..Default::default()
        }
    }

    /// 校验机器人在群内具有管理权限，并且目标成员存在
    fn require_operator<'a>(
        state: &'a mut State,
        group_id: i64,
        user_id: Option<i64>,
        action: &str,
    ) -> PlatformResult<&'a mut GroupState> {
        let group = state
            .groups
            .get_mut(&group_id)
            .ok_or(PlatformError::GroupNotFound(group_id))?;
        if !group.self_role.is_operator() {
            return Err(PlatformError::PermissionDenied(format!(
                "{} (群 {})",
                action, group_id
            )));
        }
        if let Some(user_id) = user_id
            && !group.members.contains_key(&user_id)
        {
            return Err(PlatformError::MemberNotFound { group_id, user_id });
        }
        Ok(group)
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    fn account_id(&self) -> i64 {
        self.account_id
    }

    fn nickname(&self) -> String {
        self.nickname.clone()
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    async fn friends(&self) -> PlatformResult<Vec<Friend>> {
        self.check()?;
        Ok(self.state().friends.values().cloned().collect())
    }

    async fn friend(&self, user_id: i64) -> PlatformResult<Option<Friend>> {
        self.check()?;
        Ok(self.state().friends.get(&user_id).cloned())
    }

    async fn groups(&self) -> PlatformResult<Vec<Group>> {
        self.check()?;
        Ok(self
            .state()
            .groups
            .values()
            .map(|g| g.group.clone())
            .collect())
    }

    async fn group(&self, group_id: i64) -> PlatformResult<Group> {
        self.check()?;
        self.state()
            .groups
            .get(&group_id)
            .map(|g| g.group.clone())
            .ok_or(PlatformError::GroupNotFound(group_id))
    }

    async fn members(&self, group_id: i64) -> PlatformResult<Vec<Member>> {
        self.check()?;
        let state = self.state();
        if state.hidden_members.contains(&group_id) {
            return Err(PlatformError::Transport(format!("群 {} 成员列表获取失败", group_id)));
        }
        state
            .groups
            .get(&group_id)
            .map(|g| g.members.values().cloned().collect())
            .ok_or(PlatformError::GroupNotFound(group_id))
    }

    async fn member(&self, group_id: i64, user_id: i64) -> PlatformResult<Member> {
        self.check()?;
        let state = self.state();
        let group = state
            .groups
            .get(&group_id)
            .ok_or(PlatformError::GroupNotFound(group_id))?;
        if user_id == self.account_id {
            return Ok(self.self_member_of(group));
        }
        group
            .members
            .get(&user_id)
            .cloned()
            .ok_or(PlatformError::MemberNotFound { group_id, user_id })
    }

    async fn self_member(&self, group_id: i64) -> PlatformResult<Member> {
        self.check()?;
        let state = self.state();
        state
            .groups
            .get(&group_id)
            .map(|g| self.self_member_of(g))
            .ok_or(PlatformError::GroupNotFound(group_id))
    }

    async fn send_message(
        &self,
        target: Contact,
        chain: &MessageChain,
    ) -> PlatformResult<RecallHandle> {
        self.check()?;
        if !self.is_online() {
            return Err(PlatformError::Offline);
        }

        let mut state = self.state();
        match target {
            Contact::Friend(user_id) if !state.friends.contains_key(&user_id) => {
                return Err(PlatformError::FriendNotFound(user_id));
            }
            Contact::Group(group_id) if !state.groups.contains_key(&group_id) => {
                return Err(PlatformError::GroupNotFound(group_id));
            }
            Contact::Member { group_id, user_id } => {
                let group = state
                    .groups
                    .get(&group_id)
                    .ok_or(PlatformError::GroupNotFound(group_id))?;
                if !group.members.contains_key(&user_id) {
                    return Err(PlatformError::MemberNotFound { group_id, user_id });
                }
            }
            _ => {}
        }

        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        debug!(target: "Platform", "发送消息 #{} -> {:?}: {}", id, target, chain);
        state.calls.push(PlatformCall::Send {
            id,
            target,
            chain: chain.clone(),
        });

        Ok(RecallHandle {
            id,
            target,
            token: Arc::from(format!("memory:{}", id)),
        })
    }

    async fn recall(&self, handle: &RecallHandle) -> PlatformResult<()> {
        self.check()?;
        let mut state = self.state();
        // 重复撤回不产生新的记录
        if state.recalled.insert(handle.id) {
            state.calls.push(PlatformCall::Recall(handle.id));
        }
        Ok(())
    }

    async fn kick(&self, group_id: i64, user_id: i64) -> PlatformResult<()> {
        self.check()?;
        let mut state = self.state();
        let group = Self::require_operator(&mut state, group_id, Some(user_id), "踢出成员")?;
        group.members.remove(&user_id);
        state.calls.push(PlatformCall::Kick { group_id, user_id });
        Ok(())
    }

    async fn mute(&self, group_id: i64, user_id: i64, seconds: u32) -> PlatformResult<()> {
        self.check()?;
        let mut state = self.state();
        Self::require_operator(&mut state, group_id, Some(user_id), "禁言")?;
        state.calls.push(PlatformCall::Mute {
            group_id,
            user_id,
            seconds,
        });
        Ok(())
    }

    async fn unmute(&self, group_id: i64, user_id: i64) -> PlatformResult<()> {
        self.check()?;
        let mut state = self.state();
        Self::require_operator(&mut state, group_id, Some(user_id), "解除禁言")?;
        state.calls.push(PlatformCall::Unmute { group_id, user_id });
        Ok(())
    }

    async fn set_mute_all(&self, group_id: i64, enabled: bool) -> PlatformResult<()> {
        self.check()?;
        let mut state = self.state();
        Self::require_operator(&mut state, group_id, None, "全员禁言")?;
        state.calls.push(PlatformCall::MuteAll { group_id, enabled });
        Ok(())
    }

    async fn set_name_card(&self, group_id: i64, user_id: i64, card: &str) -> PlatformResult<()> {
        self.check()?;
        let mut state = self.state();
        let group = Self::require_operator(&mut state, group_id, Some(user_id), "修改群名片")?;
        if let Some(member) = group.members.get_mut(&user_id) {
            member.card = card.to_string();
        }
        state.calls.push(PlatformCall::NameCard {
            group_id,
            user_id,
            card: card.to_string(),
        });
        Ok(())
    }

    async fn set_special_title(
        &self,
        group_id: i64,
        user_id: i64,
        title: &str,
    ) -> PlatformResult<()> {
        self.check()?;
        let mut state = self.state();
        let group = Self::require_operator(&mut state, group_id, Some(user_id), "设置专属头衔")?;
        if group.self_role != MemberRole::Owner {
            return Err(PlatformError::PermissionDenied(format!(
                "设置专属头衔需要群主身份 (群 {})",
                group_id
            )));
        }
        if let Some(member) = group.members.get_mut(&user_id) {
            member.special_title = title.to_string();
        }
        state.calls.push(PlatformCall::SpecialTitle {
            group_id,
            user_id,
            title: title.to_string(),
        });
        Ok(())
    }

    async fn set_group_name(&self, group_id: i64, name: &str) -> PlatformResult<()> {
        self.check()?;
        let mut state = self.state();
        let group = Self::require_operator(&mut state, group_id, None, "修改群名")?;
        group.group.name = name.to_string();
        state.calls.push(PlatformCall::GroupName {
            group_id,
            name: name.to_string(),
        });
        Ok(())
    }

    async fn quit_group(&self, group_id: i64) -> PlatformResult<()> {
        self.check()?;
        let mut state = self.state();
        if state.groups.remove(&group_id).is_none() {
            return Err(PlatformError::GroupNotFound(group_id));
        }
        state.calls.push(PlatformCall::Quit(group_id));
        Ok(())
    }

    async fn post_announcement(&self, group_id: i64, content: &str) -> PlatformResult<()> {
        self.check()?;
        let mut state = self.state();
        Self::require_operator(&mut state, group_id, None, "发布群公告")?;
        state.calls.push(PlatformCall::Announcement {
            group_id,
            content: content.to_string(),
        });
        Ok(())
    }

    async fn resolve_friend_request(
        &self,
        request: &FriendAddRequest,
        accept: bool,
        remark: Option<&str>,
    ) -> PlatformResult<()> {
        self.check()?;
        let mut state = self.state();
        if accept {
            state.friends.insert(
                request.from_id,
                Friend {
                    id: request.from_id,
                    nickname: request.from_nick.clone(),
                    remark: remark.unwrap_or_default().to_string(),
                },
            );
        }
        state.calls.push(PlatformCall::FriendRequest {
            event_id: request.event_id,
            accept,
            remark: remark.map(str::to_string),
        });
        Ok(())
    }

    async fn resolve_join_request(
        &self,
        request: &GroupJoinRequest,
        accept: bool,
        reason: Option<&str>,
    ) -> PlatformResult<()> {
        self.check()?;
        let mut state = self.state();
        if accept && let Some(group) = state.groups.get_mut(&request.group_id) {
            group.members.insert(
                request.from_id,
                Member {
                    group_id: request.group_id,
                    user_id: request.from_id,
                    nickname: request.from_nick.clone(),
                    ..Default::default()
                },
            );
        }
        state.calls.push(PlatformCall::JoinRequest {
            event_id: request.event_id,
            accept,
            reason: reason.map(str::to_string),
        });
        Ok(())
    }
}
