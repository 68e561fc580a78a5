// 配置管理模块
//
// 上传核心消费的都是已解析好的标量；本模块负责把 TOML 配置文件
// 读成这些标量并补默认值，环境来源的解析不在本 crate 范围内。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 单分片最大字节数（默认 8MB）
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u64,
    /// 并发上传的文件数 = 连接槽位数（默认 2）
    #[serde(default = "default_file_concurrency")]
    pub file_concurrency: usize,
    /// 单分片最大重试次数（默认 5）
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// 分片重试固定等待时间，毫秒（默认 10000）
    #[serde(default = "default_retry_wait_ms")]
    pub retry_wait_ms: u64,
    /// 单请求超时，秒（默认 30）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_chunk_size() -> u64 {
    8 * 1024 * 1024 // 8MB
}

fn default_file_concurrency() -> usize {
    2
}

fn default_retry_limit() -> u32 {
    5
}

fn default_retry_wait_ms() -> u64 {
    10_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            file_concurrency: default_file_concurrency(),
            retry_limit: default_retry_limit(),
            retry_wait_ms: default_retry_wait_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// 从 TOML 文件加载配置，文件不存在时使用默认值
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("配置文件不存在，使用默认配置: {:?}", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| format!("解析配置文件失败: {:?}", path))?;

        info!(
            "配置加载完成: 分片上限={} bytes, 并发={}, 重试={}, 等待={}ms",
            config.upload.max_chunk_size,
            config.upload.file_concurrency,
            config.upload.retry_limit,
            config.upload.retry_wait_ms
        );

        Ok(config)
    }
}
