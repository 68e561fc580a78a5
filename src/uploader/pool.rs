// 连接池管理
//
// 固定槽位的 HTTP 连接池：槽位数等于并发 worker 数，每个槽位
// 独占一个 reqwest::Client，与 worker 一一静态绑定（不跨 worker 共享）。
// 纯资源管理层，不做重试、不含业务逻辑：
// - dispose 只清空槽位并关闭连接，不移除槽位
// - replace 为（已清空的）槽位重建新连接以恢复流量
// - dispose_all 每批次结束（无论成败）恰好调用一次

use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// 固定槽位连接池
#[derive(Debug)]
pub struct ConnectionPool {
    /// 槽位数组，None 表示该槽位连接已被 dispose
    slots: Vec<Mutex<Option<Client>>>,
    /// 单请求超时（由底层传输强制，超时表现为请求错误）
    request_timeout: Duration,
}

impl ConnectionPool {
    /// 创建 n 个独立连接，槽位编号 0..n-1
    pub fn new(n: usize, request_timeout: Duration) -> Result<Self> {
        let mut slots = Vec::with_capacity(n);
        for _ in 0..n {
            slots.push(Mutex::new(Some(build_client(request_timeout)?)));
        }

        info!("连接池已创建: 槽位数={}", n);

        Ok(Self {
            slots,
            request_timeout,
        })
    }

    /// 槽位数
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// 取槽位当前连接（Client 内部是引用计数，克隆开销可忽略）
    pub fn client(&self, index: usize) -> Result<Client> {
        let slot = self
            .slots
            .get(index)
            .with_context(|| format!("连接槽位越界: {}", index))?;
        let guard = slot.lock().unwrap();
        guard
            .clone()
            .with_context(|| format!("连接槽位 {} 已被释放，尚未重建", index))
    }

    /// 释放槽位连接（槽位保留，连接随最后一个克隆 drop 关闭）
    pub fn dispose(&self, index: usize) {
        if let Some(slot) = self.slots.get(index) {
            let mut guard = slot.lock().unwrap();
            *guard = None;
            debug!("连接槽位 {} 已释放", index);
        }
    }

    /// 为槽位重建新连接
    pub fn replace(&self, index: usize) -> Result<()> {
        let slot = self
            .slots
            .get(index)
            .with_context(|| format!("连接槽位越界: {}", index))?;
        let client = build_client(self.request_timeout)?;
        let mut guard = slot.lock().unwrap();
        *guard = Some(client);
        debug!("连接槽位 {} 已重建连接", index);
        Ok(())
    }

    /// 释放所有槽位连接
    pub fn dispose_all(&self) {
        for slot in &self.slots {
            let mut guard = slot.lock().unwrap();
            *guard = None;
        }
        info!("连接池已整体释放: 槽位数={}", self.slots.len());
    }
}

/// 构建单个 HTTP 客户端
fn build_client(request_timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(request_timeout)
        .build()
        .context("Failed to create HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> ConnectionPool {
        ConnectionPool::new(n, Duration::from_secs(30)).unwrap()
    }

    #[test]
    fn test_pool_creation() {
        let p = pool(3);
        assert_eq!(p.slot_count(), 3);
        for i in 0..3 {
            assert!(p.client(i).is_ok());
        }
    }

    #[test]
    fn test_dispose_then_replace() {
        let p = pool(2);

        p.dispose(1);
        assert!(p.client(1).is_err());
        // 其他槽位不受影响
        assert!(p.client(0).is_ok());

        p.replace(1).unwrap();
        assert!(p.client(1).is_ok());
    }

    #[test]
    fn test_dispose_all() {
        let p = pool(3);
        p.dispose_all();
        for i in 0..3 {
            assert!(p.client(i).is_err());
        }
    }

    #[test]
    fn test_out_of_bounds_slot() {
        let p = pool(1);
        assert!(p.client(5).is_err());
        assert!(p.replace(5).is_err());
        // dispose 越界为空操作
        p.dispose(5);
    }
}
