// 单文件上传流水线
//
// 一个 UploadTask 产出一个 FileUploadResult：
// 1. 压缩决策（一次性，整个文件统一）
// 2. 分片划分
// 3. 同一文件的分片严格顺序发送（绝不并发打同一个文件）
// 4. 首个分片失败后进入中止态：剩余分片不再发网络请求，
//    但字节数仍计入失败统计，保证 bytes_uploaded 口径正确
//
// 压缩临时文件在本函数返回前（最后一个分片尝试结束后）随作用域删除。

use crate::events::{EventReporter, UploadEvent};
use crate::uploader::chunk::{plan_chunks, LARGE_FILE_PROGRESS_THRESHOLD, SMALL_FILE_THRESHOLD};
use crate::uploader::compress::prepare_file;
use crate::uploader::pool::ConnectionPool;
use crate::uploader::sender::{send_chunk_with_retry, ChunkRetryPolicy};
use std::path::PathBuf;
use tracing::{error, info};

/// 上传任务（构造后只读，一个输入文件一个）
#[derive(Debug, Clone)]
pub struct UploadTask {
    /// 本地文件路径
    pub local_path: PathBuf,
    /// 文件的资源 URL（已含 itemPath 查询参数）
    pub resource_url: String,
    /// 单分片最大字节数
    pub max_chunk_size: u64,
    /// 批次级失败策略（false 时首个失败触发整批中止标志）
    pub continue_on_error: bool,
}

/// 单文件上传结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadResult {
    /// 是否所有分片都成功
    pub succeeded: bool,
    /// 成功上传的字节数（按上传大小口径，失败分片扣除）
    pub bytes_uploaded: u64,
    /// 原始文件磁盘大小（失败不影响该值）
    pub total_size_on_disk: u64,
}

impl FileUploadResult {
    /// 零字节失败结果
    pub fn failed(total_size_on_disk: u64) -> Self {
        Self {
            succeeded: false,
            bytes_uploaded: 0,
            total_size_on_disk,
        }
    }
}

/// 上传单个文件的全部分片
///
/// 分片/文件级失败全部吸收为结果数据，本函数不抛错
pub async fn upload_file(
    pool: &ConnectionPool,
    slot: usize,
    task: &UploadTask,
    policy: &ChunkRetryPolicy,
    reporter: &EventReporter,
) -> FileUploadResult {
    let label = task.local_path.display().to_string();

    // 压缩决策
    let prepared = match prepare_file(&task.local_path).await {
        Ok(p) => p,
        Err(e) => {
            error!("文件准备失败: {}, 错误: {}", label, e);
            let disk_size = tokio::fs::metadata(&task.local_path)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            reporter.emit(UploadEvent::FileCompleted {
                path: label,
                succeeded: false,
                bytes_uploaded: 0,
            });
            return FileUploadResult::failed(disk_size);
        }
    };

    // 空文件：无分片可发，直接成功
    if prepared.upload_size == 0 {
        info!("空文件跳过分片发送: {}", label);
        reporter.emit(UploadEvent::FileCompleted {
            path: label,
            succeeded: true,
            bytes_uploaded: 0,
        });
        return FileUploadResult {
            succeeded: true,
            bytes_uploaded: 0,
            total_size_on_disk: prepared.disk_size,
        };
    }

    // 小文件必须装进单个分片，装不下是该文件的致命配置错误
    if prepared.disk_size < SMALL_FILE_THRESHOLD && prepared.upload_size > task.max_chunk_size {
        error!(
            "配置错误: 小文件负载 {} bytes 超过单分片上限 {} bytes: {}",
            prepared.upload_size, task.max_chunk_size, label
        );
        reporter.emit(UploadEvent::FileCompleted {
            path: label,
            succeeded: false,
            bytes_uploaded: 0,
        });
        return FileUploadResult::failed(prepared.disk_size);
    }

    let chunks = plan_chunks(
        prepared.upload_size,
        task.max_chunk_size,
        prepared.compressed,
        prepared.disk_size,
    );

    info!(
        "开始上传: file={}, 磁盘大小={}, 上传大小={}, 压缩={}, 分片数={}",
        label,
        prepared.disk_size,
        prepared.upload_size,
        prepared.compressed,
        chunks.len()
    );
    reporter.emit(UploadEvent::FileStarted {
        path: label.clone(),
        upload_size: prepared.upload_size,
        compressed: prepared.compressed,
        chunk_count: chunks.len(),
    });

    let emit_progress = prepared.upload_size > LARGE_FILE_PROGRESS_THRESHOLD;
    let mut aborted = false;
    let mut failed_bytes: u64 = 0;
    let mut uploaded_bytes: u64 = 0;

    for chunk in &chunks {
        // 中止态：不再发网络请求，只做字节记账
        if aborted {
            failed_bytes += chunk.len();
            continue;
        }

        let ok = send_chunk_with_retry(
            pool,
            slot,
            &task.resource_url,
            &prepared.source,
            chunk,
            policy,
            reporter,
            &label,
        )
        .await;

        if ok {
            uploaded_bytes += chunk.len();
            if emit_progress {
                reporter.emit(UploadEvent::FileProgress {
                    path: label.clone(),
                    uploaded_bytes,
                    total_bytes: prepared.upload_size,
                });
            }
        } else {
            failed_bytes += chunk.len();
            aborted = true;
        }
    }

    let succeeded = failed_bytes == 0;
    let bytes_uploaded = prepared.upload_size - failed_bytes;

    if succeeded {
        info!("文件上传完成: {}, {} bytes", label, bytes_uploaded);
    } else {
        error!(
            "文件上传失败: {}, 成功 {} / {} bytes",
            label, bytes_uploaded, prepared.upload_size
        );
    }
    reporter.emit(UploadEvent::FileCompleted {
        path: label,
        succeeded,
        bytes_uploaded,
    });

    FileUploadResult {
        succeeded,
        bytes_uploaded,
        total_size_on_disk: prepared.disk_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_keeps_disk_size() {
        let r = FileUploadResult::failed(12345);
        assert!(!r.succeeded);
        assert_eq!(r.bytes_uploaded, 0);
        assert_eq!(r.total_size_on_disk, 12345);
    }

    #[test]
    fn test_failed_byte_accounting_identity() {
        // bytes_uploaded + sum(failed_chunk_bytes) == upload_size
        let upload_size = 200 * 1024u64;
        let chunks = plan_chunks(upload_size, 64 * 1024, false, upload_size);
        assert_eq!(chunks.len(), 4);

        // 模拟分片 2 失败后中止：分片 2、3、4 计入失败
        let failed: u64 = chunks[1..].iter().map(|c| c.len()).sum();
        let uploaded = upload_size - failed;
        assert_eq!(uploaded, chunks[0].len());
        assert_eq!(uploaded + failed, upload_size);
    }
}
