// 上传分片划分
//
// 分片规则：
// - 文件（压缩后）按 max_chunk_size 步长顺序切分
// - 分片区间连续、不重叠、从 0 单调递增覆盖到 upload_size-1
// - 小文件（磁盘大小 < 64KB）必须装进单个分片，否则属于配置错误

use std::ops::Range;

/// 小文件阈值: 64KB（小于该值的文件整体压缩进内存，且只允许单分片）
pub const SMALL_FILE_THRESHOLD: u64 = 64 * 1024;

/// 大文件进度阈值: 100MB（上传大小超过该值时每个分片完成后推送进度事件）
pub const LARGE_FILE_PROGRESS_THRESHOLD: u64 = 100 * 1024 * 1024;

/// 分片描述符
///
/// 描述一次 HTTP 传输：字节区间为闭区间 [start, end]，
/// 线上负载长度为 `end - start + 1`，压缩时与 `uncompressed_size` 不同
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// 起始字节（含）
    pub start: u64,
    /// 结束字节（含）
    pub end: u64,
    /// 本文件上传总大小（压缩后）
    pub total_upload_size: u64,
    /// 是否为 gzip 压缩数据
    pub compressed: bool,
    /// 原始（未压缩）文件大小
    pub uncompressed_size: u64,
}

impl ChunkDescriptor {
    /// 线上负载长度
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Content-Range 头的值：`bytes start-end/total`
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total_upload_size)
    }
}

/// 计算分片
///
/// # 参数
/// * `upload_size` - 上传总大小（压缩后）
/// * `max_chunk_size` - 单分片最大字节数
/// * `compressed` - 本文件是否整体压缩
/// * `uncompressed_size` - 原始文件大小
///
/// # 返回
/// 覆盖 `[0, upload_size)` 的分片描述符列表；`upload_size` 为 0 时返回空列表
pub fn plan_chunks(
    upload_size: u64,
    max_chunk_size: u64,
    compressed: bool,
    uncompressed_size: u64,
) -> Vec<ChunkDescriptor> {
    let mut chunks = Vec::new();
    let mut offset = 0u64;

    while offset < upload_size {
        let end = std::cmp::min(offset + max_chunk_size, upload_size) - 1;
        chunks.push(ChunkDescriptor {
            start: offset,
            end,
            total_upload_size: upload_size,
            compressed,
            uncompressed_size,
        });
        offset = end + 1;
    }

    chunks
}

/// 分片的半开区间表示（读取数据时使用）
pub fn chunk_range(chunk: &ChunkDescriptor) -> Range<u64> {
    chunk.start..chunk.end + 1
}
