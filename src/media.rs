//! 媒体持久化
//!
//! 收到的图片不下载原图，只写入一个 `<MD5>.cqimg` 描述文件；
//! 收到的语音会被下载并保存为 `<MD5>.cqrecord`。哈希一律使用大写十六进制。

use crate::platform::{ImageInfo, VoiceInfo};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// 图片 CDN 地址模板
const IMAGE_URL_PREFIX: &str = "https://gchat.qpic.cn/gchatpic_new/0/0-00-";

// ============================================================================
// 1. 描述文件
// ============================================================================

pub fn upper_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

pub fn image_url(md5_hex: &str) -> String {
    format!("{}{}/0?term=2", IMAGE_URL_PREFIX, md5_hex)
}

pub fn image_file_name(md5_hex: &str) -> String {
    format!("{}.cqimg", md5_hex)
}

pub fn record_file_name(md5_hex: &str) -> String {
    format!("{}.cqrecord", md5_hex)
}

/// 生成 `.cqimg` 描述文件内容，`added_at` 为毫秒时间戳
pub fn image_descriptor(image: &ImageInfo, added_at: i64) -> String {
    let md5 = upper_hex(&image.md5);
    format!(
        "[image]\nmd5={}\nsize={}\nurl={}\naddtime={}",
        md5,
        image.size(),
        image_url(&md5),
        added_at
    )
}

/// 语音文件的哈希，平台未提供时由内容计算
pub fn voice_hash(voice: &VoiceInfo, content: &[u8]) -> String {
    if voice.md5.is_empty() {
        upper_hex(&md5::compute(content).0)
    } else {
        upper_hex(&voice.md5)
    }
}

// ============================================================================
// 2. 存储接口
// ============================================================================

/// 媒体存储
#[async_trait]
pub trait MediaStore: Send + Sync + 'static {
    async fn save_image(&self, name: &str, content: &[u8]) -> Result<PathBuf>;

    async fn save_record(&self, name: &str, content: &[u8]) -> Result<PathBuf>;

    /// 下载远程文件
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// 本地文件系统存储
///
/// 目录结构: `<data_dir>/image/`、`<data_dir>/record/`
pub struct FsMediaStore {
    image_dir: PathBuf,
    record_dir: PathBuf,
    client: reqwest::Client,
}

impl FsMediaStore {
    pub fn new(data_dir: &Path) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            image_dir: data_dir.join("image"),
            record_dir: data_dir.join("record"),
            client,
        }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    pub fn record_dir(&self) -> &Path {
        &self.record_dir
    }

    async fn write(dir: &Path, name: &str, content: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("无法创建目录 {}", dir.display()))?;
        let path = dir.join(name);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("无法写入 {}", path.display()))?;
        debug!(target: "Media", "已保存 {}", path.display());
        Ok(path)
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn save_image(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        Self::write(&self.image_dir, name, content).await
    }

    async fn save_record(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        Self::write(&self.record_dir, name, content).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("请求失败: {}", url))?
            .error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }
}
