use tonic::{Code, Status};

/// 注册中心客户端错误类型
#[derive(Debug, thiserror::Error)]
pub enum RegistryClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("gRPC error: {0}")]
    Grpc(#[from] Status),
    #[error("Heartbeat task failed: {0}")]
    Task(String),
}

impl RegistryClientError {
    /// 实例已过期或已注销，调用方应重新注册
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Grpc(status) if status.code() == Code::NotFound)
    }
}
