// 分片发送（带重试）
//
// 单个分片在单个连接槽位上的完整状态机：
//   Attempting -> { Success, Retryable, Fatal }
// - 2xx：成功
// - 可重试状态码（408/429/5xx）：释放槽位连接 -> 计数 ->
//   超出预算则失败，否则固定间隔等待 -> 重建连接 -> 重新尝试
// - 其他状态码：立即失败，不重试
// - 发送/读响应体抛错（传输层故障，含超时）：与可重试状态码同一路径，
//   共用同一个重试计数器
// 一个分片最多 1 + retry_limit 次尝试。失败被吸收为 bool，不向上抛错。

use crate::artifact::client::put_chunk;
use crate::artifact::types::StatusClass;
use crate::events::{EventReporter, UploadEvent};
use crate::uploader::chunk::{chunk_range, ChunkDescriptor};
use crate::uploader::pool::ConnectionPool;
use crate::uploader::source::ChunkSource;
use std::time::Duration;
use tracing::{debug, error, warn};

/// 分片重试策略（外部已解析的标量）
#[derive(Debug, Clone, Copy)]
pub struct ChunkRetryPolicy {
    /// 最大重试次数 R（总尝试次数 = R + 1）
    pub retry_limit: u32,
    /// 固定退避间隔（非指数）
    pub retry_wait: Duration,
}

/// 在指定槽位上上传一个分片
///
/// # 参数
/// * `file_label` - 事件/日志中标识文件的路径文本
///
/// # 返回
/// 分片是否最终成功
pub async fn send_chunk_with_retry(
    pool: &ConnectionPool,
    slot: usize,
    url: &str,
    source: &ChunkSource,
    chunk: &ChunkDescriptor,
    policy: &ChunkRetryPolicy,
    reporter: &EventReporter,
    file_label: &str,
) -> bool {
    // 分片数据读一次，重试复用
    let payload = match source.read_range(chunk_range(chunk)).await {
        Ok(data) => data,
        Err(e) => {
            error!(
                "读取分片数据失败: file={}, range={}, 错误: {}",
                file_label,
                chunk.content_range(),
                e
            );
            return false;
        }
    };

    let mut retries: u32 = 0;

    loop {
        let client = match pool.client(slot) {
            Ok(c) => c,
            Err(e) => {
                error!("获取槽位 {} 连接失败: {}", slot, e);
                return false;
            }
        };

        let outcome = put_chunk(&client, url, payload.clone(), chunk).await;

        match outcome {
            Ok(status) => match StatusClass::from_status(status) {
                StatusClass::Success => {
                    debug!(
                        "[槽位{}] ✓ 分片上传成功: file={}, range={}",
                        slot,
                        file_label,
                        chunk.content_range()
                    );
                    return true;
                }
                StatusClass::Retryable => {
                    warn!(
                        "[槽位{}] 分片返回可重试状态码 {}: file={}, range={}",
                        slot,
                        status,
                        file_label,
                        chunk.content_range()
                    );
                }
                StatusClass::Fatal => {
                    error!(
                        "[槽位{}] 分片上传失败（不可重试状态码 {}）: file={}, range={}",
                        slot,
                        status,
                        file_label,
                        chunk.content_range()
                    );
                    return false;
                }
            },
            Err(e) => {
                warn!(
                    "[槽位{}] 分片传输故障: file={}, range={}, 错误: {}",
                    slot,
                    file_label,
                    chunk.content_range(),
                    e
                );
            }
        }

        // 可重试路径：释放连接、计数、退避、重建
        pool.dispose(slot);
        retries += 1;

        if retries > policy.retry_limit {
            error!(
                "[槽位{}] 分片上传失败，已达最大重试次数 ({}): file={}, range={}",
                slot,
                policy.retry_limit,
                file_label,
                chunk.content_range()
            );
            // 槽位必须重建：同一 worker 后续文件还要用这个槽位
            if let Err(e) = pool.replace(slot) {
                error!("[槽位{}] 放弃分片后重建连接失败: {}", slot, e);
            }
            return false;
        }

        let wait_ms = policy.retry_wait.as_millis() as u64;
        warn!(
            "[槽位{}] 等待 {}ms 后重试分片 ({}/{}): file={}, range={}",
            slot,
            wait_ms,
            retries,
            policy.retry_limit,
            file_label,
            chunk.content_range()
        );
        reporter.emit(UploadEvent::ChunkRetry {
            path: file_label.to_string(),
            chunk_start: chunk.start,
            attempt: retries,
            max_retries: policy.retry_limit,
            wait_ms,
        });

        tokio::time::sleep(policy.retry_wait).await;

        if let Err(e) = pool.replace(slot) {
            error!("[槽位{}] 重建连接失败: {}", slot, e);
            return false;
        }
    }
}
