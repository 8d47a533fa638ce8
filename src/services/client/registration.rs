use std::collections::HashMap;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};

use super::config::RegistryClientConfig;
use super::error::RegistryClientError;
use crate::registry::{
    DeregisterRequest, GetServiceRequest, HealthRequest, HealthResponse, HeartbeatRequest,
    ListServicesRequest, RegisterRequest, RegistryStatus, ServiceInstance, ServiceList,
    StatusRequest, registry_service_client::RegistryServiceClient,
};

/// 注册中心客户端
#[derive(Debug, Clone)]
pub struct RegistryClient {
    config: RegistryClientConfig,
    client: RegistryServiceClient<Channel>,
}

impl RegistryClient {
    /// 创建新的注册中心客户端
    pub async fn new(config: RegistryClientConfig) -> Result<Self, RegistryClientError> {
        let endpoint = Endpoint::from_shared(config.registry_address.clone())?
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout);

        let channel = endpoint.connect().await?;
        let client = RegistryServiceClient::new(channel);

        Ok(Self { config, client })
    }

    /// 便捷的创建方法，使用默认配置
    pub async fn connect(registry_address: &str) -> Result<Self, RegistryClientError> {
        let config = RegistryClientConfig {
            registry_address: registry_address.to_string(),
            ..Default::default()
        };
        Self::new(config).await
    }

    pub fn config(&self) -> &RegistryClientConfig {
        &self.config
    }

    pub async fn register(
        &mut self,
        service_name: &str,
        base_url: &str,
    ) -> Result<ServiceInstance, RegistryClientError> {
        let response = self
            .client
            .register(RegisterRequest {
                service_name: service_name.to_string(),
                base_url: base_url.to_string(),
            })
            .await?;
        Ok(response.into_inner())
    }

    pub async fn heartbeat(&mut self, instance_id: &str) -> Result<(), RegistryClientError> {
        self.client
            .heartbeat(HeartbeatRequest {
                instance_id: instance_id.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn deregister(&mut self, instance_id: &str) -> Result<(), RegistryClientError> {
        self.client
            .deregister(DeregisterRequest {
                instance_id: instance_id.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn get_service(
        &mut self,
        service_name: &str,
    ) -> Result<ServiceList, RegistryClientError> {
        let response = self
            .client
            .get_service(GetServiceRequest {
                service_name: service_name.to_string(),
            })
            .await?;
        Ok(response.into_inner())
    }

    pub async fn list_services(
        &mut self,
    ) -> Result<HashMap<String, ServiceList>, RegistryClientError> {
        let response = self.client.list_services(ListServicesRequest {}).await?;
        Ok(response.into_inner().services)
    }

    pub async fn status(&mut self) -> Result<RegistryStatus, RegistryClientError> {
        let response = self.client.get_status(StatusRequest {}).await?;
        Ok(response.into_inner())
    }

    pub async fn health(&mut self) -> Result<HealthResponse, RegistryClientError> {
        let response = self.client.health(HealthRequest {}).await?;
        Ok(response.into_inner())
    }

    /// 注册实例并在后台按 `heartbeat_interval` 发送心跳
    ///
    /// 心跳失败只记录日志并在下个周期重试；注册中心返回 NOT_FOUND
    /// （实例已过期被清理）时自动重新注册，并更新当前的 instance_id。
    pub async fn register_with_heartbeat(
        mut self,
        service_name: &str,
        base_url: &str,
    ) -> Result<Registration, RegistryClientError> {
        let instance = self.register(service_name, base_url).await?;
        tracing::info!(
            service_name = %service_name,
            instance_id = %instance.instance_id,
            "Registered with service registry"
        );

        let (id_tx, id_rx) = watch::channel(instance.instance_id.clone());
        let cancel = CancellationToken::new();
        let heartbeat_task = tokio::spawn(Self::heartbeat_loop(
            self.clone(),
            service_name.to_string(),
            base_url.to_string(),
            id_tx,
            cancel.clone(),
        ));

        Ok(Registration {
            client: self,
            instance_id: id_rx,
            cancel,
            heartbeat_task,
        })
    }

    async fn heartbeat_loop(
        mut client: RegistryClient,
        service_name: String,
        base_url: String,
        instance_id: watch::Sender<String>,
        cancel: CancellationToken,
    ) {
        let mut interval = tokio::time::interval(client.config.heartbeat_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let current = instance_id.borrow().clone();
            match client.heartbeat(&current).await {
                Ok(()) => {
                    tracing::debug!(instance_id = %current, "Heartbeat sent");
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(
                        service_name = %service_name,
                        instance_id = %current,
                        "Instance no longer registered, re-registering"
                    );
                    match client.register(&service_name, &base_url).await {
                        Ok(instance) => {
                            tracing::info!(
                                service_name = %service_name,
                                instance_id = %instance.instance_id,
                                "Re-registered with service registry"
                            );
                            instance_id.send_replace(instance.instance_id);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Re-registration failed, will retry");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        instance_id = %current,
                        error = %e,
                        "Heartbeat failed, will retry"
                    );
                }
            }
        }
    }
}

/// 已注册实例的句柄，持有后台心跳任务
#[derive(Debug)]
pub struct Registration {
    client: RegistryClient,
    instance_id: watch::Receiver<String>,
    cancel: CancellationToken,
    heartbeat_task: JoinHandle<()>,
}

impl Registration {
    /// 当前的 instance_id（重新注册后会变化）
    pub fn instance_id(&self) -> String {
        self.instance_id.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.instance_id.clone()
    }

    /// 停止心跳并注销实例
    pub async fn shutdown(mut self) -> Result<(), RegistryClientError> {
        self.cancel.cancel();
        (&mut self.heartbeat_task)
            .await
            .map_err(|e| RegistryClientError::Task(e.to_string()))?;

        let instance_id = self.instance_id();
        self.client.deregister(&instance_id).await?;
        tracing::info!(instance_id = %instance_id, "Deregistered from service registry");
        Ok(())
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
