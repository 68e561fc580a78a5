// 上传事件
//
// 核心在明确的时间点发事件（分片重试、大文件进度、文件完成、批次完成），
// 展示逻辑完全由外部订阅方负责。未挂接收端时事件静默丢弃。

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// 上传事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// 单文件开始上传
    FileStarted {
        path: String,
        upload_size: u64,
        compressed: bool,
        chunk_count: usize,
    },
    /// 大文件（上传大小 > 100MB）分片完成后的字节进度
    FileProgress {
        path: String,
        uploaded_bytes: u64,
        total_bytes: u64,
    },
    /// 分片瞬态失败，等待后重试
    ChunkRetry {
        path: String,
        chunk_start: u64,
        attempt: u32,
        max_retries: u32,
        wait_ms: u64,
    },
    /// 单文件上传结束
    FileCompleted {
        path: String,
        succeeded: bool,
        bytes_uploaded: u64,
    },
    /// 整批结束
    BatchCompleted {
        total_bytes_uploaded: u64,
        failed_count: usize,
    },
}

/// 事件上报句柄
///
/// 可克隆；内部是可选的无界 channel 发送端
#[derive(Debug, Clone, Default)]
pub struct EventReporter {
    tx: Option<mpsc::UnboundedSender<UploadEvent>>,
}

impl EventReporter {
    /// 创建带接收端的上报器
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UploadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// 不上报任何事件
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// 发送事件（接收端关闭或未挂接时静默丢弃）
    pub fn emit(&self, event: UploadEvent) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (reporter, mut rx) = EventReporter::channel();

        reporter.emit(UploadEvent::FileStarted {
            path: "a.txt".into(),
            upload_size: 10,
            compressed: false,
            chunk_count: 1,
        });
        reporter.emit(UploadEvent::FileCompleted {
            path: "a.txt".into(),
            succeeded: true,
            bytes_uploaded: 10,
        });

        assert!(matches!(
            rx.recv().await.unwrap(),
            UploadEvent::FileStarted { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            UploadEvent::FileCompleted { succeeded: true, .. }
        ));
    }

    #[test]
    fn test_disabled_reporter_is_silent() {
        let reporter = EventReporter::disabled();
        // 不 panic 即可
        reporter.emit(UploadEvent::BatchCompleted {
            total_bytes_uploaded: 0,
            failed_count: 0,
        });
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = UploadEvent::ChunkRetry {
            path: "big.bin".into(),
            chunk_start: 0,
            attempt: 1,
            max_retries: 3,
            wait_ms: 500,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "chunk_retry");
        assert_eq!(json["wait_ms"], 500);
    }
}
