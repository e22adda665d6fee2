//! 控制台宿主
//!
//! 从标准输入逐行读取 JSON 请求帧 (`{"action": ..., "params": ..., "echo": ...}`)，
//! 把响应帧打印到标准输出。平台为内存实现，另外支持几条模拟事件的命令：
//!
//! - `/friend <user_id> [留言]`：模拟好友申请
//! - `/join <group_id> <user_id> [留言]`：模拟加群申请
//! - `/temp <group_id> <user_id>`：模拟一条临时会话消息
//! - `/exit`：退出

use anyhow::Context as _;
use cqhttp_bridge::config::ConfigManager;
use cqhttp_bridge::event::{InboundMessage, PlatformEvent};
use cqhttp_bridge::gateway::Gateway;
use cqhttp_bridge::media::FsMediaStore;
use cqhttp_bridge::platform::memory::MemoryPlatform;
use cqhttp_bridge::platform::{Contact, FriendAddRequest, GroupJoinRequest, MemberRole, Platform};
use cqhttp_bridge::{log, session};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

const CONSOLE_ACCOUNT: i64 = 10000;

fn console_platform() -> MemoryPlatform {
    MemoryPlatform::new(CONSOLE_ACCOUNT, "Console")
        .with_friend(10001, "Alice")
        .with_group(20000, "测试群", MemberRole::Owner)
        .with_member(20000, 10001, "Alice", MemberRole::Member)
        .with_member(20000, 10002, "Bob", MemberRole::Administrator)
}

/// 把控制台命令转换为平台事件
fn parse_command(line: &str, next_event_id: &mut i64) -> Option<PlatformEvent> {
    let mut parts = line.split_whitespace();
    let command = parts.next()?;
    let mut num = || parts.next().and_then(|s| s.parse::<i64>().ok());
    *next_event_id += 1;
    let event_id = *next_event_id;

    match command {
        "/friend" => {
            let from_id = num()?;
            Some(PlatformEvent::FriendRequest {
                account_id: CONSOLE_ACCOUNT,
                request: FriendAddRequest {
                    event_id,
                    from_id,
                    from_nick: from_id.to_string(),
                    message: rest(line, 2),
                },
            })
        }
        "/join" => {
            let group_id = num()?;
            let from_id = num()?;
            Some(PlatformEvent::GroupJoinRequest {
                account_id: CONSOLE_ACCOUNT,
                request: GroupJoinRequest {
                    event_id,
                    from_id,
                    from_nick: from_id.to_string(),
                    group_id,
                    group_name: String::new(),
                    message: rest(line, 3),
                },
            })
        }
        "/temp" => {
            let group_id = num()?;
            let user_id = num()?;
            Some(PlatformEvent::Message {
                account_id: CONSOLE_ACCOUNT,
                message: InboundMessage::new(Contact::Member { group_id, user_id }, user_id),
            })
        }
        _ => None,
    }
}

/// 跳过前 n 个词后的剩余文本
fn rest(line: &str, n: usize) -> String {
    line.split_whitespace().skip(n).collect::<Vec<_>>().join(" ")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    log::init(false);
    let manager = ConfigManager::new("config.toml");
    manager.load().await?;
    let config = manager.ensure_account(CONSOLE_ACCOUNT).await?;
    log::set_debug(config.debug);

    let platform: Arc<dyn Platform> = Arc::new(console_platform());
    let media = Arc::new(FsMediaStore::new(&config.data_dir));
    let gateway = Arc::new(Gateway::new(config, session::global(), media));
    gateway.enable(&[platform]).await;

    let (tx, rx) = mpsc::channel(64);
    let runner = gateway.clone();
    let event_loop = tokio::spawn(async move { runner.run(rx).await });

    let session = gateway
        .sessions()
        .get(CONSOLE_ACCOUNT)
        .await
        .context("控制台账号的会话未创建")?;
    info!(target: "Console", "已就绪，输入 JSON 请求帧，/exit 退出");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut next_event_id = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/exit" {
            break;
        }

        if line.starts_with('/') {
            match parse_command(line, &mut next_event_id) {
                Some(event) => {
                    if tx.send(event).await.is_err() {
                        warn!(target: "Console", "事件循环已退出");
                        break;
                    }
                }
                None => warn!(target: "Console", "无法识别的命令: {}", line),
            }
            continue;
        }

        println!("{}", session.router().handle_frame(line).await);
    }

    drop(tx);
    let _ = event_loop.await;
    gateway.disable().await;
    Ok(())
}
