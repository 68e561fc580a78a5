// 工件服务接口模块

pub mod client;
pub mod types;

pub use client::{put_chunk, resource_url, ArtifactClient};
pub use types::{
    ArtifactError, CreateContainerRequest, CreateContainerResponse, PatchSizeRequest, StatusClass,
    ORIGINAL_SIZE_HEADER,
};
