// 分片数据来源
//
// 统一的有界字节源：同一文件的所有分片从同一个来源按区间读取。
// 两种形态由流水线在压缩决策时一次性选定：
// - Memory: 小文件（或小文件的压缩结果）整体驻留内存
// - File:   磁盘文件（原始文件或压缩临时文件）按区间 seek + read

use anyhow::{Context, Result};
use std::ops::Range;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

/// 有界字节源
#[derive(Debug)]
pub enum ChunkSource {
    /// 内存缓冲
    Memory(Vec<u8>),
    /// 磁盘文件
    File(PathBuf),
}

impl ChunkSource {
    /// 来源总长度
    pub async fn len(&self) -> Result<u64> {
        match self {
            ChunkSource::Memory(data) => Ok(data.len() as u64),
            ChunkSource::File(path) => {
                let meta = tokio::fs::metadata(path)
                    .await
                    .context("读取文件元数据失败")?;
                Ok(meta.len())
            }
        }
    }

    /// 读取一个字节区间
    ///
    /// # 参数
    /// * `range` - 半开区间 [start, end)，必须落在来源范围内
    pub async fn read_range(&self, range: Range<u64>) -> Result<Vec<u8>> {
        let size = (range.end - range.start) as usize;

        match self {
            ChunkSource::Memory(data) => {
                let start = range.start as usize;
                let end = range.end as usize;
                if end > data.len() {
                    anyhow::bail!("读取区间越界: {}..{} (总长 {})", start, end, data.len());
                }
                Ok(data[start..end].to_vec())
            }
            ChunkSource::File(path) => {
                let mut file = File::open(path).await.context("打开上传文件失败")?;

                // 定位到分片起始位置
                file.seek(std::io::SeekFrom::Start(range.start))
                    .await
                    .context("文件定位失败")?;

                let mut buffer = vec![0u8; size];
                file.read_exact(&mut buffer)
                    .await
                    .context("读取分片数据失败")?;

                debug!(
                    "读取分片数据: path={:?}, bytes={}-{}, 大小={} bytes",
                    path,
                    range.start,
                    range.end - 1,
                    size
                );

                Ok(buffer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_memory_source_range() {
        let source = ChunkSource::Memory(b"0123456789".to_vec());
        assert_eq!(source.len().await.unwrap(), 10);
        assert_eq!(source.read_range(0..4).await.unwrap(), b"0123");
        assert_eq!(source.read_range(4..10).await.unwrap(), b"456789");
    }

    #[tokio::test]
    async fn test_memory_source_out_of_bounds() {
        let source = ChunkSource::Memory(b"abc".to_vec());
        assert!(source.read_range(0..4).await.is_err());
    }

    #[tokio::test]
    async fn test_file_source_range() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"AABBCCDDEE").unwrap();
        tmp.flush().unwrap();

        let source = ChunkSource::File(tmp.path().to_path_buf());
        assert_eq!(source.len().await.unwrap(), 10);
        assert_eq!(source.read_range(0..4).await.unwrap(), b"AABB");
        assert_eq!(source.read_range(8..10).await.unwrap(), b"EE");
    }
}
