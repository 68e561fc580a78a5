// 上传前压缩决策
//
// 每个文件在发送任何分片之前做一次 gzip 决策，整个文件统一生效：
// - 磁盘大小 < 64KB：整体压缩进内存
// - 磁盘大小 >= 64KB：压缩进磁盘临时文件
// 两种情况下，压缩结果不比原文件严格更小时立即放弃压缩，
// 改为上传原始字节；临时产物（内存缓冲/临时文件）随之丢弃。
//
// 临时文件由 PreparedUpload 持有，作用域结束（包括压缩无效提前放弃、
// 最后一个分片发送完毕、任意错误路径）自动删除。

use crate::uploader::chunk::SMALL_FILE_THRESHOLD;
use crate::uploader::source::ChunkSource;
use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// 压缩决策后的上传载体
#[derive(Debug)]
pub struct PreparedUpload {
    /// 分片数据来源（原始文件、内存缓冲或压缩临时文件）
    pub source: ChunkSource,
    /// 实际上传大小（压缩后；未压缩时等于磁盘大小）
    pub upload_size: u64,
    /// 是否启用了 gzip
    pub compressed: bool,
    /// 原始文件磁盘大小
    pub disk_size: u64,
    /// 压缩临时文件守卫，drop 时删除文件
    _temp: Option<NamedTempFile>,
}

/// 对单个文件做压缩决策并构造上传载体
///
/// # 参数
/// * `path` - 本地文件路径
pub async fn prepare_file(path: &Path) -> Result<PreparedUpload> {
    let meta = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("读取文件元数据失败: {:?}", path))?;
    let disk_size = meta.len();

    if disk_size < SMALL_FILE_THRESHOLD {
        prepare_small_file(path, disk_size).await
    } else {
        prepare_large_file(path, disk_size).await
    }
}

/// 小文件：整体读入内存后压缩
async fn prepare_small_file(path: &Path, disk_size: u64) -> Result<PreparedUpload> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("读取文件失败: {:?}", path))?;

    // gzip 属于 CPU 密集操作，放到阻塞线程池
    let original = data.clone();
    let compressed = tokio::task::spawn_blocking(move || gzip_bytes(&data)).await??;

    if (compressed.len() as u64) < disk_size {
        debug!(
            "小文件压缩生效: {:?}, {} -> {} bytes",
            path,
            disk_size,
            compressed.len()
        );
        let upload_size = compressed.len() as u64;
        Ok(PreparedUpload {
            source: ChunkSource::Memory(compressed),
            upload_size,
            compressed: true,
            disk_size,
            _temp: None,
        })
    } else {
        debug!(
            "小文件压缩无效，改传原始字节: {:?}, {} -> {} bytes",
            path,
            disk_size,
            compressed.len()
        );
        Ok(PreparedUpload {
            source: ChunkSource::Memory(original),
            upload_size: disk_size,
            compressed: false,
            disk_size,
            _temp: None,
        })
    }
}

/// 大文件：流式压缩进磁盘临时文件
async fn prepare_large_file(path: &Path, disk_size: u64) -> Result<PreparedUpload> {
    let src_path = path.to_path_buf();
    let (temp, compressed_size) =
        tokio::task::spawn_blocking(move || gzip_to_temp_file(&src_path)).await??;

    if compressed_size < disk_size {
        info!(
            "文件压缩生效: {:?}, {} -> {} bytes",
            path, disk_size, compressed_size
        );
        let temp_path = temp.path().to_path_buf();
        Ok(PreparedUpload {
            source: ChunkSource::File(temp_path),
            upload_size: compressed_size,
            compressed: true,
            disk_size,
            _temp: Some(temp),
        })
    } else {
        // 放弃压缩，temp 在此处 drop 即删除
        info!(
            "文件压缩无效，改传原始字节: {:?}, {} -> {} bytes",
            path, disk_size, compressed_size
        );
        Ok(PreparedUpload {
            source: ChunkSource::File(path.to_path_buf()),
            upload_size: disk_size,
            compressed: false,
            disk_size,
            _temp: None,
        })
    }
}

/// 内存 gzip
fn gzip_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).context("gzip 写入失败")?;
    encoder.finish().context("gzip 结束失败")
}

/// 将文件流式压缩到临时文件，返回守卫和压缩后大小
fn gzip_to_temp_file(src: &PathBuf) -> Result<(NamedTempFile, u64)> {
    let mut input = std::fs::File::open(src).with_context(|| format!("打开文件失败: {:?}", src))?;
    let temp = NamedTempFile::new().context("创建压缩临时文件失败")?;

    let mut encoder = GzEncoder::new(temp.reopen()?, Compression::default());
    std::io::copy(&mut input, &mut encoder).context("gzip 压缩失败")?;
    let out = encoder.finish().context("gzip 结束失败")?;
    out.sync_all().ok();

    let compressed_size = temp.as_file().metadata()?.len();
    Ok((temp, compressed_size))
}
