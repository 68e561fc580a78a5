// 工件服务接口类型

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// gzip 分片附带的原始大小头（服务端据此校验/报告真实大小）
pub const ORIGINAL_SIZE_HEADER: &str = "x-artifact-filelength";

/// 创建文件容器请求体
#[derive(Debug, Clone, Serialize)]
pub struct CreateContainerRequest {
    /// 容器类型，固定为 actions_storage
    #[serde(rename = "Type")]
    pub container_type: String,
    /// 工件名称
    #[serde(rename = "Name")]
    pub name: String,
}

impl CreateContainerRequest {
    pub fn new(name: &str) -> Self {
        Self {
            container_type: "actions_storage".to_string(),
            name: name.to_string(),
        }
    }
}

/// 创建文件容器响应
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContainerResponse {
    /// 容器资源根 URL，后续分片 PUT 以它为基础拼接 itemPath
    #[serde(rename = "fileContainerResourceUrl")]
    pub file_container_resource_url: String,
    /// 容器 ID
    #[serde(rename = "containerId", default)]
    pub container_id: u64,
    /// 工件名称（服务端回显）
    #[serde(rename = "name", default)]
    pub name: String,
}

/// 终结工件大小请求体
#[derive(Debug, Clone, Serialize)]
pub struct PatchSizeRequest {
    /// 工件未压缩总大小
    #[serde(rename = "Size")]
    pub size: u64,
}

/// 状态码分类
///
/// 重试判定只看状态码：408/429/全部 5xx 可重试，其余非 2xx 直接失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 成功 (2xx)
    Success,
    /// 瞬态错误，可重试
    Retryable,
    /// 不可重试
    Fatal,
}

impl StatusClass {
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            StatusClass::Success
        } else if status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            StatusClass::Retryable
        } else {
            StatusClass::Fatal
        }
    }
}

/// 工件服务级错误
///
/// 仅基础设施故障走这条路（容器创建、大小终结、响应体异常）；
/// 分片/文件级失败被吸收为数据，不抛错
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// 创建容器返回非 2xx
    #[error("创建文件容器失败: HTTP {status}")]
    ContainerCreate { status: u16 },

    /// 响应体为空或无法解析
    #[error("响应体解析失败: {0}")]
    MalformedResponse(String),

    /// 终结大小时工件不存在
    #[error("工件不存在: {name}")]
    ArtifactNotFound { name: String },

    /// 终结大小返回其他非 2xx
    #[error("终结工件大小失败: HTTP {status}")]
    PatchSize { status: u16 },

    /// 传输层错误
    #[error("请求失败: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_statuses() {
        assert_eq!(
            StatusClass::from_status(StatusCode::OK),
            StatusClass::Success
        );
        assert_eq!(
            StatusClass::from_status(StatusCode::CREATED),
            StatusClass::Success
        );
    }

    #[test]
    fn test_retryable_statuses() {
        for code in [408u16, 429, 500, 502, 503, 504] {
            assert_eq!(
                StatusClass::from_status(StatusCode::from_u16(code).unwrap()),
                StatusClass::Retryable,
                "状态码 {} 应可重试",
                code
            );
        }
    }

    #[test]
    fn test_fatal_statuses() {
        for code in [400u16, 401, 403, 404, 409, 413] {
            assert_eq!(
                StatusClass::from_status(StatusCode::from_u16(code).unwrap()),
                StatusClass::Fatal,
                "状态码 {} 不应重试",
                code
            );
        }
    }

    #[test]
    fn test_create_container_request_shape() {
        let req = CreateContainerRequest::new("build-output");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["Type"], "actions_storage");
        assert_eq!(json["Name"], "build-output");
    }

    #[test]
    fn test_create_container_response_parse() {
        let body = r#"{"containerId": 7, "name": "build-output",
                       "fileContainerResourceUrl": "http://host/upload/7"}"#;
        let resp: CreateContainerResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.container_id, 7);
        assert_eq!(resp.file_container_resource_url, "http://host/upload/7");
    }
}
