// 工件服务客户端
//
// 覆盖三类调用：
// 1. 创建文件容器（POST，批次前置条件，失败直接抛错）
// 2. 分片 PUT（核心操作，重试由 uploader::sender 负责，这里只发一次）
// 3. 终结工件大小（PATCH，批次收尾，404 视为工件不存在）

use crate::artifact::types::{
    ArtifactError, CreateContainerRequest, CreateContainerResponse, PatchSizeRequest,
    ORIGINAL_SIZE_HEADER,
};
use crate::uploader::chunk::ChunkDescriptor;
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error, info};

/// 工件 API 版本（Accept 头携带）
const API_VERSION: &str = "application/json;api-version=6.0-preview";

/// 工件服务客户端
///
/// 容器创建与大小终结走自有连接；分片 PUT 使用连接池槽位的连接，
/// 见 [`put_chunk`]
#[derive(Debug, Clone)]
pub struct ArtifactClient {
    /// HTTP客户端
    client: Client,
    /// 已解析的服务基地址
    base_url: String,
}

impl ArtifactClient {
    /// 创建客户端
    ///
    /// # 参数
    /// * `base_url` - 已解析的上传服务基地址
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 创建文件容器
    ///
    /// 非 2xx 或响应体为空/不可解析均为致命错误（批次在任何上传前失败）
    pub async fn create_container(
        &self,
        name: &str,
    ) -> Result<CreateContainerResponse, ArtifactError> {
        let url = format!("{}/_apis/artifacts", self.base_url);
        info!("创建文件容器: name={}, url={}", name, url);

        let response = self
            .client
            .post(&url)
            .header("Accept", API_VERSION)
            .json(&CreateContainerRequest::new(name))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("创建文件容器失败: name={}, status={}", name, status);
            return Err(ArtifactError::ContainerCreate {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        if body.is_empty() {
            return Err(ArtifactError::MalformedResponse(
                "创建容器响应体为空".to_string(),
            ));
        }

        let container: CreateContainerResponse = serde_json::from_str(&body)
            .map_err(|e| ArtifactError::MalformedResponse(format!("{}: {}", e, body)))?;

        info!(
            "文件容器创建成功: name={}, container_id={}, resource_url={}",
            name, container.container_id, container.file_container_resource_url
        );

        Ok(container)
    }

    /// 终结工件大小
    ///
    /// 所有文件上传完成后调用一次；404 表示工件不存在
    pub async fn patch_artifact_size(&self, name: &str, size: u64) -> Result<(), ArtifactError> {
        let url = format!(
            "{}/_apis/artifacts?artifactName={}",
            self.base_url,
            urlencoding::encode(name)
        );
        info!("终结工件大小: name={}, size={}", name, size);

        let response = self
            .client
            .patch(&url)
            .header("Accept", API_VERSION)
            .json(&PatchSizeRequest { size })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            error!("终结工件大小失败: 工件不存在, name={}", name);
            return Err(ArtifactError::ArtifactNotFound {
                name: name.to_string(),
            });
        }
        if !status.is_success() {
            error!("终结工件大小失败: name={}, status={}", name, status);
            return Err(ArtifactError::PatchSize {
                status: status.as_u16(),
            });
        }

        info!("工件大小终结成功: name={}, size={}", name, size);
        Ok(())
    }
}

/// 为单个文件拼接分片 PUT 的资源 URL
///
/// itemPath 查询参数携带 `工件名/上传相对路径`，整体 URL 编码
pub fn resource_url(container_url: &str, artifact_name: &str, upload_path: &str) -> String {
    let item_path = format!("{}/{}", artifact_name, upload_path.trim_start_matches('/'));
    format!(
        "{}?itemPath={}",
        container_url,
        urlencoding::encode(&item_path)
    )
}

/// 发送一个分片（单次尝试，不含重试）
///
/// # 参数
/// * `client` - 所用连接槽位的客户端
/// * `url` - 文件的资源 URL（已含 itemPath）
/// * `payload` - 分片负载，长度必须等于 `chunk.len()`
///
/// # 返回
/// 响应状态码；发送/读响应体抛错视为传输层故障，由调用方按可重试处理。
/// 响应体必须完整读掉，连接才能被复用。
pub async fn put_chunk(
    client: &Client,
    url: &str,
    payload: Vec<u8>,
    chunk: &ChunkDescriptor,
) -> Result<StatusCode> {
    debug_assert_eq!(payload.len() as u64, chunk.len());

    let mut request = client
        .put(url)
        .header("Accept", API_VERSION)
        .header("Content-Type", "application/octet-stream")
        .header("Content-Range", chunk.content_range());

    if chunk.compressed {
        request = request
            .header("Content-Encoding", "gzip")
            .header(ORIGINAL_SIZE_HEADER, chunk.uncompressed_size.to_string());
    }

    let response = request
        .body(payload)
        .send()
        .await
        .context("分片请求发送失败")?;

    let status = response.status();

    // 完整排空响应体（连接复用的前提）
    let _ = response.bytes().await.context("读取分片响应失败")?;

    debug!(
        "分片响应: range={}, status={}",
        chunk.content_range(),
        status
    );

    Ok(status)
}
