use tonic::Status;

use super::clock::ClockError;

/// 注册中心错误类型
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Instance {instance_id} not found")]
    InstanceNotFound { instance_id: String },

    #[error("Sweep cycle failed: {reason}")]
    SweepCycleFailure { reason: String },

    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("Registry lock poisoned")]
    LockPoisoned,
}

impl RegistryError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(instance_id: impl Into<String>) -> Self {
        Self::InstanceNotFound {
            instance_id: instance_id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::InstanceNotFound { .. })
    }
}

// 映射为 gRPC 状态码：未找到与服务端故障可区分
impl From<RegistryError> for Status {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidInput { .. } => Status::invalid_argument(err.to_string()),
            RegistryError::InstanceNotFound { .. } => Status::not_found(err.to_string()),
            RegistryError::SweepCycleFailure { .. }
            | RegistryError::Clock(_)
            | RegistryError::LockPoisoned => Status::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn maps_errors_to_distinct_grpc_codes() {
        let status: Status = RegistryError::not_found("abc").into();
        assert_eq!(status.code(), Code::NotFound);
        assert!(status.message().contains("abc"));

        let status: Status = RegistryError::invalid("service_name", "must not be empty").into();
        assert_eq!(status.code(), Code::InvalidArgument);

        let status: Status = RegistryError::LockPoisoned.into();
        assert_eq!(status.code(), Code::Internal);
    }
}
