use std::sync::Arc;

use super::store::RegistryStore;
use super::types::{RegistryStatus, ServiceInstance, ServiceListing, unix_micros};
use crate::registry as pb;

pub const SERVICE_LABEL: &str = "registry";

// gRPC 层使用的注册中心服务，只持有存储的句柄
#[derive(Debug, Clone)]
pub struct RegistryHandler {
    pub store: Arc<RegistryStore>,
}

impl RegistryHandler {
    pub fn new(store: Arc<RegistryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RegistryStore> {
        &self.store
    }
}

impl From<ServiceInstance> for pb::ServiceInstance {
    fn from(instance: ServiceInstance) -> Self {
        Self {
            instance_id: instance.instance_id.to_string(),
            service_name: instance.service_name,
            base_url: instance.base_url,
            registered_at: unix_micros(instance.registered_at),
            last_heartbeat: unix_micros(instance.last_heartbeat),
        }
    }
}

impl From<ServiceListing> for pb::ServiceList {
    fn from(listing: ServiceListing) -> Self {
        Self {
            service_name: listing.service_name,
            count: listing.count as u64,
            instances: listing.instances.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<RegistryStatus> for pb::RegistryStatus {
    fn from(status: RegistryStatus) -> Self {
        Self {
            status: "ok".into(),
            total_services: status.total_services as u64,
            total_instances: status.total_instances as u64,
            services: status
                .services
                .into_iter()
                .map(|(name, count)| (name, count as u64))
                .collect(),
        }
    }
}

pub(crate) fn ack(instance: &ServiceInstance) -> pb::InstanceAck {
    pb::InstanceAck {
        status: "ok".into(),
        instance_id: instance.instance_id.to_string(),
    }
}
