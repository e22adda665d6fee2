use cqhttp_bridge::cache::PendingRequest;
use cqhttp_bridge::config::SessionConfig;
use cqhttp_bridge::message::Element;
use cqhttp_bridge::params::ParamMap;
use cqhttp_bridge::platform::memory::{MemoryPlatform, PlatformCall};
use cqhttp_bridge::platform::{Contact, FriendAddRequest, GroupJoinRequest, MemberRole};
use cqhttp_bridge::response::{OutcomeClass, Payload, ResponseEnvelope};
use cqhttp_bridge::router::ApiRouter;
use serde_json::{Value, json};
use std::sync::Arc;

const BOT: i64 = 10000;

fn platform() -> Arc<MemoryPlatform> {
    Arc::new(
        MemoryPlatform::new(BOT, "bot")
            .with_friend(1, "alice")
            .with_group(100, "admins", MemberRole::Administrator)
            .with_member(100, 2, "bob", MemberRole::Member)
            .with_member(100, 3, "carol", MemberRole::Member)
            .with_group(200, "plain", MemberRole::Member)
            .with_member(200, 4, "dave", MemberRole::Member)
            .with_group(300, "owned", MemberRole::Owner)
            .with_member(300, 5, "erin", MemberRole::Member),
    )
}

fn setup() -> (Arc<MemoryPlatform>, ApiRouter) {
    setup_with(SessionConfig::default())
}

fn setup_with(config: SessionConfig) -> (Arc<MemoryPlatform>, ApiRouter) {
    let platform = platform();
    let router = ApiRouter::new(platform.clone(), &config, "data");
    (platform, router)
}

fn params(v: Value) -> ParamMap {
    v.as_object().cloned().unwrap()
}

fn message_id(envelope: &ResponseEnvelope) -> i32 {
    match envelope {
        ResponseEnvelope::Success(Payload::MessageId(data)) => data.message_id,
        other => panic!("expected message id, got {:?}", other),
    }
}

// ============================================================================
// 分发
// ============================================================================

#[tokio::test]
async fn unknown_action_is_malformed() {
    let (platform, router) = setup();
    let envelope = router.dispatch("no_such_action", &ParamMap::new()).await;
    assert_eq!(envelope, ResponseEnvelope::MalformedRequest);
    assert_eq!(envelope.class(), OutcomeClass::BadRequest);
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn unknown_action_with_async_suffix_is_malformed() {
    let (platform, router) = setup();
    for action in ["no_such_action_async", "_async", "send_msg_async_async"] {
        let envelope = router.dispatch(action, &ParamMap::new()).await;
        assert_eq!(envelope, ResponseEnvelope::MalformedRequest, "{}", action);
    }
    tokio::task::yield_now().await;
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn async_suffix_runs_in_background() {
    let (platform, router) = setup();
    let envelope = router
        .dispatch("send_group_msg_async", &params(json!({"group_id": 100, "message": "hi"})))
        .await;
    assert_eq!(envelope, ResponseEnvelope::AsyncAccepted);

    for _ in 0..100 {
        if !platform.sent().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(platform.sent().len(), 1);
}

#[tokio::test]
async fn frames_round_trip_with_echo() {
    let (_, router) = setup();
    let out = router
        .handle_frame(r#"{"action":"get_login_info","echo":"e1"}"#)
        .await;
    let v: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(v["status"], "ok");
    assert_eq!(v["retcode"], 0);
    assert_eq!(v["data"]["user_id"], BOT);
    assert_eq!(v["echo"], "e1");

    let out = router.handle_frame("not json").await;
    let v: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(v["retcode"], 100);
    assert_eq!(v["status"], "failed");
}

// ============================================================================
// 消息
// ============================================================================

#[tokio::test]
async fn group_target_is_inferred_from_group_id() {
    let (platform, router) = setup();
    let inferred = router
        .dispatch("send_msg", &params(json!({"group_id": 100, "message": "hi"})))
        .await;
    let explicit = router
        .dispatch(
            "send_msg",
            &params(json!({"message_type": "group", "group_id": "100", "message": "hi"})),
        )
        .await;

    assert!(inferred.is_success());
    assert!(explicit.is_success());
    let sent = platform.sent();
    assert_eq!(sent[0], sent[1]);
    assert_eq!(sent[0].0, Contact::Group(100));
}

#[tokio::test]
async fn user_id_wins_over_group_id_when_type_is_absent() {
    let (platform, router) = setup();
    let envelope = router
        .dispatch(
            "send_msg",
            &params(json!({"user_id": 1, "group_id": 100, "message": "hi"})),
        )
        .await;
    assert!(envelope.is_success());
    assert_eq!(platform.sent()[0].0, Contact::Friend(1));
}

#[tokio::test]
async fn unusable_message_type_is_malformed() {
    let (platform, router) = setup();
    for p in [
        json!({"message_type": "discuss", "group_id": 100, "message": "hi"}),
        json!({"message": "hi"}),
        json!({"group_id": 100}),
        json!({"group_id": 100, "message": ""}),
        json!({"group_id": "abc", "message": "hi"}),
    ] {
        let envelope = router.dispatch("send_msg", &params(p)).await;
        assert_eq!(envelope, ResponseEnvelope::MalformedRequest);
    }
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn private_send_falls_back_to_temp_contact() {
    let (platform, router) = setup();
    router.temp_contacts().record(4, 200);

    let envelope = router
        .dispatch("send_private_msg", &params(json!({"user_id": 4, "message": "hey"})))
        .await;
    assert!(envelope.is_success());
    assert_eq!(
        platform.sent()[0].0,
        Contact::Member {
            group_id: 200,
            user_id: 4
        }
    );
}

#[tokio::test]
async fn private_send_scans_groups_without_temp_contact() {
    let (platform, router) = setup();
    let envelope = router
        .dispatch("send_private_msg", &params(json!({"user_id": 3, "message": "hey"})))
        .await;
    assert!(envelope.is_success());
    assert_eq!(
        platform.sent()[0].0,
        Contact::Member {
            group_id: 100,
            user_id: 3
        }
    );
}

#[tokio::test]
async fn private_send_skips_groups_whose_members_cannot_be_listed() {
    let (platform, router) = setup();
    platform.hide_members(100);

    let envelope = router
        .dispatch("send_private_msg", &params(json!({"user_id": 4, "message": "hey"})))
        .await;
    assert!(envelope.is_success());
    assert_eq!(
        platform.sent()[0].0,
        Contact::Member {
            group_id: 200,
            user_id: 4
        }
    );

    let envelope = router
        .dispatch("send_private_msg", &params(json!({"user_id": 3, "message": "hey"})))
        .await;
    assert_eq!(envelope, ResponseEnvelope::PluginFailure);
}

#[tokio::test]
async fn private_send_to_stranger_is_plugin_failure() {
    let (platform, router) = setup();
    let envelope = router
        .dispatch("send_private_msg", &params(json!({"user_id": 999, "message": "hey"})))
        .await;
    assert_eq!(envelope, ResponseEnvelope::PluginFailure);
    assert!(platform.sent().is_empty());
}

#[tokio::test]
async fn segments_are_converted_before_sending() {
    let (platform, router) = setup();
    let envelope = router
        .dispatch(
            "send_group_msg",
            &params(json!({
                "group_id": 100,
                "message": [
                    {"type": "at", "data": {"qq": "2"}},
                    {"type": "text", "data": {"text": " hello"}}
                ]
            })),
        )
        .await;
    assert!(envelope.is_success());
    let (_, chain) = &platform.sent()[0];
    assert_eq!(
        chain.elements(),
        &[Element::At(2), Element::Text(" hello".into())]
    );
}

#[tokio::test]
async fn sent_messages_can_be_deleted() {
    let (platform, router) = setup();
    let sent = router
        .dispatch("send_group_msg", &params(json!({"group_id": 100, "message": "oops"})))
        .await;
    let id = message_id(&sent);
    assert!(router.sources().contains(id));

    let envelope = router
        .dispatch("delete_msg", &params(json!({"message_id": id})))
        .await;
    assert!(envelope.is_success());
    assert!(platform.calls().contains(&PlatformCall::Recall(id)));

    // 撤回后句柄仍在缓存中，再次撤回不会报错
    assert!(router.sources().contains(id));
    let again = router
        .dispatch("delete_msg", &params(json!({"message_id": id})))
        .await;
    assert!(again.is_success());
}

#[tokio::test]
async fn deleting_unknown_or_evicted_ids_is_malformed() {
    let config = SessionConfig {
        cache_source_size: 2,
        ..Default::default()
    };
    let (platform, router) = setup_with(config);

    let mut ids = Vec::new();
    for text in ["a", "b", "c"] {
        let sent = router
            .dispatch("send_group_msg", &params(json!({"group_id": 100, "message": text})))
            .await;
        ids.push(message_id(&sent));
    }
    assert_eq!(router.sources().len(), 2);

    let evicted = router
        .dispatch("delete_msg", &params(json!({"message_id": ids[0]})))
        .await;
    assert_eq!(evicted, ResponseEnvelope::MalformedRequest);

    let never = router
        .dispatch("delete_msg", &params(json!({"message_id": 424242})))
        .await;
    assert_eq!(never, ResponseEnvelope::MalformedRequest);

    let missing = router.dispatch("delete_msg", &ParamMap::new()).await;
    assert_eq!(missing, ResponseEnvelope::MalformedRequest);

    assert!(
        !platform
            .calls()
            .iter()
            .any(|c| matches!(c, PlatformCall::Recall(_)))
    );

    let kept = router
        .dispatch("delete_msg", &params(json!({"message_id": ids[2]})))
        .await;
    assert!(kept.is_success());
}

// ============================================================================
// 群管理
// ============================================================================

#[tokio::test]
async fn kick_requires_identifiers_and_permission() {
    let (platform, router) = setup();

    let missing = router
        .dispatch("set_group_kick", &params(json!({"group_id": 100})))
        .await;
    assert_eq!(missing, ResponseEnvelope::MalformedRequest);
    assert!(platform.calls().is_empty());

    let denied = router
        .dispatch("set_group_kick", &params(json!({"group_id": 200, "user_id": 4})))
        .await;
    assert_eq!(denied, ResponseEnvelope::PlatformRejected);
    assert_eq!(denied.class(), OutcomeClass::PlatformDeclined);

    let ok = router
        .dispatch("set_group_kick", &params(json!({"group_id": 100, "user_id": 2})))
        .await;
    assert!(ok.is_success());
    assert!(!platform.is_member(100, 2));
}

#[tokio::test]
async fn ban_uses_default_duration_and_zero_unmutes() {
    let (platform, router) = setup();
    router
        .dispatch("set_group_ban", &params(json!({"group_id": 100, "user_id": 2})))
        .await;
    router
        .dispatch(
            "set_group_ban",
            &params(json!({"group_id": 100, "user_id": 2, "duration": 0})),
        )
        .await;
    let negative = router
        .dispatch(
            "set_group_ban",
            &params(json!({"group_id": 100, "user_id": 2, "duration": -5})),
        )
        .await;
    assert_eq!(negative, ResponseEnvelope::MalformedRequest);

    assert_eq!(
        platform.calls(),
        vec![
            PlatformCall::Mute {
                group_id: 100,
                user_id: 2,
                seconds: 1800
            },
            PlatformCall::Unmute {
                group_id: 100,
                user_id: 2
            },
        ]
    );
}

#[tokio::test]
async fn whole_ban_defaults_to_enabled() {
    let (platform, router) = setup();
    let envelope = router
        .dispatch("set_group_whole_ban", &params(json!({"group_id": 100})))
        .await;
    assert!(envelope.is_success());
    assert_eq!(
        platform.calls(),
        vec![PlatformCall::MuteAll {
            group_id: 100,
            enabled: true
        }]
    );
}

#[tokio::test]
async fn card_and_title_default_to_empty() {
    let (platform, router) = setup();
    router
        .dispatch("set_group_card", &params(json!({"group_id": 100, "user_id": 2})))
        .await;
    let title = router
        .dispatch(
            "set_group_special_title",
            &params(json!({"group_id": 300, "user_id": 5, "special_title": "王"})),
        )
        .await;
    assert!(title.is_success());

    let title_denied = router
        .dispatch(
            "set_group_special_title",
            &params(json!({"group_id": 100, "user_id": 2})),
        )
        .await;
    assert_eq!(title_denied, ResponseEnvelope::PlatformRejected);

    assert_eq!(
        platform.calls(),
        vec![
            PlatformCall::NameCard {
                group_id: 100,
                user_id: 2,
                card: String::new()
            },
            PlatformCall::SpecialTitle {
                group_id: 300,
                user_id: 5,
                title: "王".into()
            },
        ]
    );
}

#[tokio::test]
async fn admin_and_dismiss_are_rejected_after_validation() {
    let (platform, router) = setup();

    let admin = router
        .dispatch("set_group_admin", &params(json!({"group_id": 100, "user_id": 2})))
        .await;
    assert_eq!(admin, ResponseEnvelope::PlatformRejected);
    let admin_missing = router
        .dispatch("set_group_admin", &params(json!({"group_id": 100})))
        .await;
    assert_eq!(admin_missing, ResponseEnvelope::MalformedRequest);

    let dismiss = router
        .dispatch("set_group_leave", &params(json!({"group_id": 300, "is_dismiss": true})))
        .await;
    assert_eq!(dismiss, ResponseEnvelope::PlatformRejected);
    assert!(platform.calls().is_empty());

    let leave = router
        .dispatch("set_group_leave", &params(json!({"group_id": 300})))
        .await;
    assert!(leave.is_success());
    assert_eq!(platform.calls(), vec![PlatformCall::Quit(300)]);
}

#[tokio::test]
async fn name_and_announcement_must_not_be_empty() {
    let (platform, router) = setup();
    for (action, p) in [
        ("set_group_name", json!({"group_id": 100, "name": ""})),
        ("set_group_name", json!({"group_id": 100})),
        ("_set_group_announcement", json!({"group_id": 100, "content": ""})),
    ] {
        assert_eq!(
            router.dispatch(action, &params(p)).await,
            ResponseEnvelope::MalformedRequest
        );
    }
    assert!(platform.calls().is_empty());

    let renamed = router
        .dispatch("set_group_name", &params(json!({"group_id": 100, "name": "新群名"})))
        .await;
    assert!(renamed.is_success());
    let posted = router
        .dispatch(
            "_set_group_announcement",
            &params(json!({"group_id": 100, "content": "公告"})),
        )
        .await;
    assert!(posted.is_success());
    assert_eq!(platform.calls().len(), 2);
}

// ============================================================================
// 申请
// ============================================================================

fn friend_request(event_id: i64) -> PendingRequest {
    PendingRequest::Friend(FriendAddRequest {
        event_id,
        from_id: 42,
        from_nick: "newbie".into(),
        message: "加个好友".into(),
    })
}

fn join_request(event_id: i64) -> PendingRequest {
    PendingRequest::GroupJoin(GroupJoinRequest {
        event_id,
        from_id: 43,
        from_nick: "joiner".into(),
        group_id: 100,
        group_name: "admins".into(),
        message: String::new(),
    })
}

#[tokio::test]
async fn unknown_flag_is_treated_as_resolved() {
    let (platform, router) = setup();
    let envelope = router
        .dispatch("set_friend_add_request", &params(json!({"flag": "123"})))
        .await;
    assert!(envelope.is_success());
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn absent_or_non_numeric_flag_is_malformed() {
    let (_, router) = setup();
    for p in [json!({}), json!({"flag": "abc"}), json!({"flag": null})] {
        assert_eq!(
            router.dispatch("set_group_add_request", &params(p)).await,
            ResponseEnvelope::MalformedRequest
        );
    }
}

#[tokio::test]
async fn cached_request_resolves_once() {
    let (platform, router) = setup();
    router.requests().add(friend_request(7));

    let first = router
        .dispatch(
            "set_friend_add_request",
            &params(json!({"flag": "7", "remark": "新朋友"})),
        )
        .await;
    assert!(first.is_success());
    assert!(platform.is_friend(42));

    let second = router
        .dispatch("set_friend_add_request", &params(json!({"flag": 7})))
        .await;
    assert_eq!(second, ResponseEnvelope::PlatformRejected);

    assert_eq!(
        platform.calls(),
        vec![PlatformCall::FriendRequest {
            event_id: 7,
            accept: true,
            remark: Some("新朋友".into())
        }]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_approvals_resolve_once() {
    let (platform, router) = setup();
    router.requests().add(friend_request(10));

    let a = {
        let router = router.clone();
        tokio::spawn(async move {
            router
                .dispatch("set_friend_add_request", &params(json!({"flag": 10})))
                .await
        })
    };
    let b = {
        let router = router.clone();
        tokio::spawn(async move {
            router
                .dispatch("set_friend_add_request", &params(json!({"flag": 10})))
                .await
        })
    };
    let (a, b) = tokio::join!(a, b);
    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|e| e.is_success());

    assert_eq!(outcomes[0], ResponseEnvelope::PlatformRejected);
    assert!(outcomes[1].is_success());
    let resolutions = platform
        .calls()
        .into_iter()
        .filter(|c| matches!(c, PlatformCall::FriendRequest { .. }))
        .count();
    assert_eq!(resolutions, 1);
}

#[tokio::test]
async fn request_of_the_other_kind_is_ignored() {
    let (platform, router) = setup();
    router.requests().add(join_request(8));

    let envelope = router
        .dispatch("set_friend_add_request", &params(json!({"flag": 8})))
        .await;
    assert!(envelope.is_success());
    assert!(platform.calls().is_empty());

    let envelope = router
        .dispatch(
            "set_group_add_request",
            &params(json!({"flag": 8, "approve": false, "reason": "不认识"})),
        )
        .await;
    assert!(envelope.is_success());
    assert_eq!(
        platform.calls(),
        vec![PlatformCall::JoinRequest {
            event_id: 8,
            accept: false,
            reason: Some("不认识".into())
        }]
    );
}

#[tokio::test]
async fn failed_resolution_can_be_retried() {
    let (platform, router) = setup();
    router.requests().add(friend_request(9));

    platform.set_broken(true);
    let failed = router
        .dispatch("set_friend_add_request", &params(json!({"flag": 9})))
        .await;
    assert_eq!(failed, ResponseEnvelope::PluginFailure);

    platform.set_broken(false);
    let retried = router
        .dispatch("set_friend_add_request", &params(json!({"flag": 9})))
        .await;
    assert!(retried.is_success());
}

// ============================================================================
// 查询
// ============================================================================

#[tokio::test]
async fn member_list_contains_self_exactly_once() {
    let (_, router) = setup();
    let envelope = router
        .dispatch("get_group_member_list", &params(json!({"group_id": 100})))
        .await;
    let Some(Payload::MemberList(members)) = envelope.payload() else {
        panic!("unexpected envelope {:?}", envelope);
    };
    assert_eq!(members.len(), 3);
    let me: Vec<_> = members.iter().filter(|m| m.user_id == BOT).collect();
    assert_eq!(me.len(), 1);
    assert_eq!(me[0].role, "admin");
}

#[tokio::test]
async fn group_info_counts_self() {
    let (_, router) = setup();
    let envelope = router
        .dispatch("get_group_info", &params(json!({"group_id": 100})))
        .await;
    let Some(Payload::GroupInfo(info)) = envelope.payload() else {
        panic!("unexpected envelope {:?}", envelope);
    };
    assert_eq!(info.group_name, "admins");
    assert_eq!(info.member_count, 3);
    assert_eq!(info.max_member_count, 0);
}

#[tokio::test]
async fn lists_are_materialised() {
    let (_, router) = setup();
    let friends = router.dispatch("get_friend_list", &ParamMap::new()).await;
    assert!(matches!(friends.payload(), Some(Payload::FriendList(f)) if f.len() == 1));

    let groups = router.dispatch("get_group_list", &ParamMap::new()).await;
    assert!(matches!(groups.payload(), Some(Payload::GroupList(g)) if g.len() == 3));

    let member = router
        .dispatch(
            "get_group_member_info",
            &params(json!({"group_id": 100, "user_id": 2})),
        )
        .await;
    assert!(matches!(member.payload(), Some(Payload::MemberInfo(m)) if m.nickname == "bob"));

    let unknown = router
        .dispatch("get_group_info", &params(json!({"group_id": 999})))
        .await;
    assert_eq!(unknown, ResponseEnvelope::PluginFailure);
}

#[tokio::test]
async fn status_reflects_platform_online_state() {
    let (platform, router) = setup();
    let status = router.dispatch("get_status", &ParamMap::new()).await;
    assert!(matches!(status.payload(), Some(Payload::Status(s)) if s.online && s.good));

    platform.set_online(false);
    let status = router.dispatch("get_status", &ParamMap::new()).await;
    assert!(matches!(status.payload(), Some(Payload::Status(s)) if !s.online && s.app_good));

    let version = router.dispatch("get_version_info", &ParamMap::new()).await;
    assert!(
        matches!(version.payload(), Some(Payload::Version(v)) if v.coolq_edition == "pro" && v.coolq_directory == "data")
    );
}

#[tokio::test]
async fn capability_and_lifecycle_actions_always_succeed() {
    let (platform, router) = setup();
    for action in [
        "can_send_image",
        "can_send_record",
        "set_restart_plugin",
        "clean_data_dir",
        "clean_plugin_log",
    ] {
        assert!(router.dispatch(action, &ParamMap::new()).await.is_success());
    }
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn unsupported_actions_are_rejected_without_platform_calls() {
    let (platform, router) = setup();
    for action in [
        "get_record",
        "get_image",
        "get_cookies",
        "get_csrf_token",
        "get_credentials",
        "get_stranger_info",
        "send_discuss_msg",
        "set_group_anonymous",
        "set_group_anonymous_ban",
        "set_discuss_leave",
        "send_like",
    ] {
        let envelope = router
            .dispatch(action, &params(json!({"group_id": 100, "user_id": 2})))
            .await;
        assert_eq!(envelope, ResponseEnvelope::PlatformRejected, "{}", action);
    }
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn transport_failures_become_plugin_failure() {
    let (platform, router) = setup();
    platform.set_broken(true);
    let envelope = router.dispatch("get_friend_list", &ParamMap::new()).await;
    assert_eq!(envelope, ResponseEnvelope::PluginFailure);
    assert_eq!(envelope.retcode(), 103);
}
