use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use toml::Value;
use tracing::{debug, info};

/// 应用配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    // 调试日志开关
    #[serde(default)]
    pub debug: bool,

    // 数据目录 (图片/语音缓存均位于其下)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    // 按账号配置会话，未配置的账号不会创建会话
    #[serde(default)]
    pub accounts: HashMap<String, SessionConfig>,
}

/// 单个账号的会话配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionConfig {
    // 已发送消息的撤回句柄缓存容量
    #[serde(default = "default_cache_source_size")]
    pub cache_source_size: usize,

    // 是否为收到的图片写入 .cqimg 描述文件
    #[serde(default)]
    pub cache_image: bool,

    // 是否下载并保存收到的语音
    #[serde(default)]
    pub cache_record: bool,

    // 是否把收到的消息也登记进撤回缓存
    #[serde(default)]
    pub cache_inbound_source: bool,

    // HTTP / WebSocket 等由宿主读取的配置，原样保留
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_cache_source_size() -> usize {
    512
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_source_size: default_cache_source_size(),
            cache_image: false,
            cache_record: false,
            cache_inbound_source: false,
            extra: HashMap::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            data_dir: default_data_dir(),
            accounts: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// 获取指定账号的会话配置
    pub fn session_config(&self, account_id: i64) -> Option<SessionConfig> {
        self.accounts.get(&account_id.to_string()).cloned()
    }
}

/// 配置文件
///
/// 磁盘上的 TOML 与内存副本保持一致，所有写入都经过 [`ConfigManager::save_atomic`]。
pub struct ConfigManager {
    path: PathBuf,
    current: RwLock<AppConfig>,
}

impl ConfigManager {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            current: RwLock::new(AppConfig::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取配置，文件不存在时写入默认配置
    pub async fn load(&self) -> anyhow::Result<AppConfig> {
        if !self.path.exists() {
            info!(target: "Config", "配置文件 {} 不存在，已生成默认配置", self.path.display());
            let cfg = AppConfig::default();
            self.save_atomic(&cfg).await?;
            return Ok(cfg);
        }

        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("读取配置文件 {} 失败", self.path.display()))?;
        let cfg: AppConfig = toml::from_str(&text)
            .with_context(|| format!("解析配置文件 {} 失败", self.path.display()))?;
        debug!(target: "Config", "已加载 {} 个账号配置", cfg.accounts.len());

        *self.current.write().await = cfg.clone();
        Ok(cfg)
    }

    /// 账号缺少配置段时写入默认会话配置并保存，返回最新配置
    pub async fn ensure_account(&self, account_id: i64) -> anyhow::Result<AppConfig> {
        let mut current = self.current.write().await;
        let key = account_id.to_string();
        if current.accounts.contains_key(&key) {
            return Ok(current.clone());
        }

        current.accounts.insert(key, SessionConfig::default());
        let cfg = current.clone();
        drop(current);

        self.save_atomic(&cfg).await?;
        info!(target: "Config", "已为账号 {} 写入默认会话配置", account_id);
        Ok(cfg)
    }

    /// 写临时文件后 rename 覆盖
    pub async fn save_atomic(&self, cfg: &AppConfig) -> anyhow::Result<()> {
        let text = toml::to_string_pretty(cfg)?;
        let target = self.path.clone();
        let tmp = target.with_extension("tmp");

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&tmp)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &target)
        })
        .await?
        .with_context(|| format!("写入配置文件 {} 失败", self.path.display()))?;

        *self.current.write().await = cfg.clone();
        Ok(())
    }
}
