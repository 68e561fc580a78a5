// Artifact Upload Rust Library
// 制品分块上传客户端核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 上传事件模块
pub mod events;

// 制品存储 API 模块
pub mod artifact;

// 上传引擎模块
pub mod uploader;

// 导出常用类型
pub use artifact::{ArtifactClient, ArtifactError, StatusClass};
pub use config::{AppConfig, LogConfig, UploadConfig};
pub use events::{EventReporter, UploadEvent};
pub use logging::{init_logging, LogGuard};
pub use uploader::{
    AggregateUploadResult, ChunkDescriptor, ChunkRetryPolicy, ConnectionPool, FileSpec,
    FileUploadResult, UploadCoordinator, UploadOptions, UploadTask,
};
