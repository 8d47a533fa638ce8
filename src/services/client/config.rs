use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_REGISTRY_ADDRESS: &str = "http://localhost:50051";

/// 注册中心客户端配置
#[derive(Debug, Clone)]
pub struct RegistryClientConfig {
    /// 注册中心地址
    pub registry_address: String,
    /// 单次请求超时时间
    pub request_timeout: Duration,
    /// 连接超时时间
    pub connect_timeout: Duration,
    /// 心跳间隔，应明显小于注册中心的心跳超时
    pub heartbeat_interval: Duration,
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            registry_address: DEFAULT_REGISTRY_ADDRESS.to_string(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ClientEnv {
    url: Option<String>,
}

impl RegistryClientConfig {
    /// 从 REGISTRY_URL 读取注册中心地址，未设置时使用默认值
    pub fn from_env() -> Result<Self, envy::Error> {
        Self::from_vars(std::env::vars())
    }

    fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env: ClientEnv = envy::prefixed("REGISTRY_").from_iter(vars)?;
        Ok(Self {
            registry_address: env
                .url
                .unwrap_or_else(|| DEFAULT_REGISTRY_ADDRESS.to_string()),
            ..Default::default()
        })
    }
}
