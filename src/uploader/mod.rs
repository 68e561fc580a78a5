// 上传引擎模块
//
// 依赖方向（叶子在前）：
//   pool -> sender -> pipeline -> coordinator
// coordinator 是外部调用的入口（容器创建/大小终结的协调也在其中）

pub mod chunk;
pub mod compress;
pub mod coordinator;
pub mod pipeline;
pub mod pool;
pub mod sender;
pub mod source;

pub use chunk::{
    plan_chunks, ChunkDescriptor, LARGE_FILE_PROGRESS_THRESHOLD, SMALL_FILE_THRESHOLD,
};
pub use compress::{prepare_file, PreparedUpload};
pub use coordinator::{AggregateUploadResult, FileSpec, UploadCoordinator, UploadOptions};
pub use pipeline::{upload_file, FileUploadResult, UploadTask};
pub use pool::ConnectionPool;
pub use sender::{send_chunk_with_retry, ChunkRetryPolicy};
pub use source::ChunkSource;
