use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// 实例唯一标识，由注册中心在注册时生成，永不复用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

// 单个服务实例记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    pub instance_id: InstanceId,
    pub service_name: String,
    pub base_url: String,
    pub registered_at: SystemTime,
    pub last_heartbeat: SystemTime,
}

impl ServiceInstance {
    /// 距上次心跳经过的时间；时钟回拨时按 0 计算
    pub fn heartbeat_age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.last_heartbeat).unwrap_or_default()
    }

    pub fn is_expired(&self, now: SystemTime, timeout: Duration) -> bool {
        self.heartbeat_age(now) > timeout
    }
}

// 按服务名查询的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceListing {
    pub service_name: String,
    pub instances: Vec<ServiceInstance>,
    pub count: usize,
}

impl ServiceListing {
    pub fn new(service_name: impl Into<String>, instances: Vec<ServiceInstance>) -> Self {
        let count = instances.len();
        Self {
            service_name: service_name.into(),
            instances,
            count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

// 注册中心统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStatus {
    pub total_services: usize,
    pub total_instances: usize,
    pub services: BTreeMap<String, usize>,
}

/// 单次清理的结果
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub evicted: Vec<ServiceInstance>,
    pub remaining: usize,
}

/// 注册中心运行参数，启动时读取一次，之后不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySettings {
    pub heartbeat_timeout: Duration,
    pub cleanup_interval: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(10),
        }
    }
}

/// 转换为 Unix 纪元微秒，早于纪元的时间记为 0
pub fn unix_micros(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
