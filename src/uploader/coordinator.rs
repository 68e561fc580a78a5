// 批次并发协调
//
// 固定 W 个 worker，每个 worker 静态绑定一个连接槽位；全体 worker
// 通过同一个原子游标认领文件下标（fetch_add 无挂起点，天然原子），
// 认领到的文件整体交给单文件流水线处理。
//
// 快速失败语义（continue_on_error = false）：
// - 任一文件失败即置起共享中止标志
// - 标志置起之后认领到的文件不发任何网络请求，按零字节失败记录
// - 已在途的上传照常跑完，不强制取消
//
// 批次结束（无论成败）恰好释放一次全部连接槽位。

use crate::artifact::client::{resource_url, ArtifactClient};
use crate::events::{EventReporter, UploadEvent};
use crate::uploader::pipeline::{upload_file, UploadTask};
use crate::uploader::pool::ConnectionPool;
use crate::uploader::sender::ChunkRetryPolicy;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// 待上传文件（绝对路径 + 容器内相对路径）
#[derive(Debug, Clone)]
pub struct FileSpec {
    /// 本地绝对路径
    pub absolute_path: PathBuf,
    /// 容器内上传路径
    pub upload_path: String,
}

/// 批次选项
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// 文件失败后是否继续上传其余文件（默认 true）
    pub continue_on_error: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            continue_on_error: true,
        }
    }
}

/// 整批上传结果
#[derive(Debug, Clone, Default)]
pub struct AggregateUploadResult {
    /// 成功上传的总字节数（上传大小口径）
    pub total_bytes_uploaded: u64,
    /// 全部文件磁盘总大小
    pub total_bytes_on_disk: u64,
    /// 失败文件路径，按首次失败顺序
    pub failed_files: Vec<PathBuf>,
}

/// worker 间共享的批次状态（显式传入，不用全局量）
struct BatchState {
    /// 下一个待认领的文件下标
    cursor: AtomicUsize,
    /// 中止标志（仅 continue_on_error = false 时可能置起）
    abort: AtomicBool,
    total_uploaded: AtomicU64,
    total_on_disk: AtomicU64,
    /// 失败文件，push 顺序即首次失败顺序
    failed: Mutex<Vec<PathBuf>>,
}

/// 上传并发协调器
///
/// 入口对象：持有已解析的数值参数和事件上报句柄
#[derive(Debug, Clone)]
pub struct UploadCoordinator {
    /// 单分片最大字节数
    pub max_chunk_size: u64,
    /// 并发 worker 数（= 连接槽位数）
    pub file_concurrency: usize,
    /// 分片最大重试次数
    pub retry_limit: u32,
    /// 分片重试固定等待
    pub retry_wait: Duration,
    /// 单请求超时
    pub request_timeout: Duration,
    /// 事件上报
    pub reporter: EventReporter,
}

impl UploadCoordinator {
    /// 上传一个完整工件：创建容器 -> 批量上传 -> 终结大小
    ///
    /// 容器创建或大小终结失败会抛错（基础设施级故障）；
    /// 单个文件的失败只体现在返回值的 failed_files 里
    pub async fn upload_artifact(
        &self,
        base_url: &str,
        artifact_name: &str,
        files: &[FileSpec],
        options: &UploadOptions,
    ) -> Result<AggregateUploadResult> {
        let client = ArtifactClient::new(base_url)?;

        let container = client
            .create_container(artifact_name)
            .await
            .context("创建文件容器失败")?;

        let tasks: Vec<UploadTask> = files
            .iter()
            .map(|f| UploadTask {
                local_path: f.absolute_path.clone(),
                resource_url: resource_url(
                    &container.file_container_resource_url,
                    artifact_name,
                    &f.upload_path,
                ),
                max_chunk_size: self.max_chunk_size,
                continue_on_error: options.continue_on_error,
            })
            .collect();

        let result = self.upload_batch(tasks).await?;

        client
            .patch_artifact_size(artifact_name, result.total_bytes_on_disk)
            .await
            .context("终结工件大小失败")?;

        Ok(result)
    }

    /// 上传一批任务
    pub async fn upload_batch(&self, tasks: Vec<UploadTask>) -> Result<AggregateUploadResult> {
        let worker_count = self.file_concurrency.min(tasks.len()).max(1);
        let pool = Arc::new(ConnectionPool::new(worker_count, self.request_timeout)?);

        info!(
            "批次开始: 文件数={}, worker数={}, 分片上限={} bytes, 重试上限={}",
            tasks.len(),
            worker_count,
            self.max_chunk_size,
            self.retry_limit
        );

        let tasks = Arc::new(tasks);
        let state = Arc::new(BatchState {
            cursor: AtomicUsize::new(0),
            abort: AtomicBool::new(false),
            total_uploaded: AtomicU64::new(0),
            total_on_disk: AtomicU64::new(0),
            failed: Mutex::new(Vec::new()),
        });
        let policy = ChunkRetryPolicy {
            retry_limit: self.retry_limit,
            retry_wait: self.retry_wait,
        };

        let mut join_set = JoinSet::new();
        for slot in 0..worker_count {
            let tasks = Arc::clone(&tasks);
            let pool = Arc::clone(&pool);
            let state = Arc::clone(&state);
            let reporter = self.reporter.clone();
            join_set.spawn(async move {
                run_worker(slot, tasks, pool, state, policy, reporter).await;
            });
        }

        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                error!("上传 worker 异常退出: {}", e);
            }
        }

        // 无论成败，连接槽位整体释放一次
        pool.dispose_all();

        let failed_files = state.failed.lock().unwrap().clone();
        let result = AggregateUploadResult {
            total_bytes_uploaded: state.total_uploaded.load(Ordering::SeqCst),
            total_bytes_on_disk: state.total_on_disk.load(Ordering::SeqCst),
            failed_files,
        };

        info!(
            "批次结束: 上传 {} bytes, 磁盘共 {} bytes, 失败 {} 个文件",
            result.total_bytes_uploaded,
            result.total_bytes_on_disk,
            result.failed_files.len()
        );
        self.reporter.emit(UploadEvent::BatchCompleted {
            total_bytes_uploaded: result.total_bytes_uploaded,
            failed_count: result.failed_files.len(),
        });

        Ok(result)
    }
}

/// 单个 worker：循环认领文件直到游标越界
async fn run_worker(
    slot: usize,
    tasks: Arc<Vec<UploadTask>>,
    pool: Arc<ConnectionPool>,
    state: Arc<BatchState>,
    policy: ChunkRetryPolicy,
    reporter: EventReporter,
) {
    loop {
        let index = state.cursor.fetch_add(1, Ordering::SeqCst);
        if index >= tasks.len() {
            break;
        }
        let task = &tasks[index];

        // 中止标志置起后认领到的文件：零字节失败，不发请求
        if !task.continue_on_error && state.abort.load(Ordering::SeqCst) {
            warn!(
                "[worker{}] 批次已中止，跳过文件: {:?}",
                slot, task.local_path
            );
            let disk_size = tokio::fs::metadata(&task.local_path)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            state.total_on_disk.fetch_add(disk_size, Ordering::SeqCst);
            state
                .failed
                .lock()
                .unwrap()
                .push(task.local_path.clone());
            reporter.emit(UploadEvent::FileCompleted {
                path: task.local_path.display().to_string(),
                succeeded: false,
                bytes_uploaded: 0,
            });
            continue;
        }

        let result = upload_file(&pool, slot, task, &policy, &reporter).await;

        state
            .total_uploaded
            .fetch_add(result.bytes_uploaded, Ordering::SeqCst);
        state
            .total_on_disk
            .fetch_add(result.total_size_on_disk, Ordering::SeqCst);

        if !result.succeeded {
            state
                .failed
                .lock()
                .unwrap()
                .push(task.local_path.clone());
            if !task.continue_on_error {
                state.abort.store(true, Ordering::SeqCst);
                warn!(
                    "[worker{}] 文件失败且 continue_on_error=false，置起中止标志: {:?}",
                    slot, task.local_path
                );
            }
        }
    }
}
