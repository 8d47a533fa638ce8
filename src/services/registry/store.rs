use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use http::Uri;

use super::clock::{Clock, SystemClock};
use super::error::RegistryError;
use super::types::{
    InstanceId, RegistrySettings, RegistryStatus, ServiceInstance, ServiceListing, SweepReport,
};

// 服务名 -> 实例列表，外加实例ID -> 服务名的索引
#[derive(Debug, Default)]
struct RegistryState {
    services: HashMap<String, Vec<ServiceInstance>>,
    index: HashMap<InstanceId, String>,
}

impl RegistryState {
    fn find_mut(&mut self, instance_id: &InstanceId) -> Option<&mut ServiceInstance> {
        let service_name = self.index.get(instance_id)?;
        self.services
            .get_mut(service_name)?
            .iter_mut()
            .find(|instance| &instance.instance_id == instance_id)
    }

    fn remove(&mut self, instance_id: &InstanceId) -> Option<ServiceInstance> {
        let service_name = self.index.remove(instance_id)?;
        let instances = self.services.get_mut(&service_name)?;
        let position = instances
            .iter()
            .position(|instance| &instance.instance_id == instance_id)?;
        let removed = instances.remove(position);

        // 空服务直接移除，查询时与不存在的服务等价
        if instances.is_empty() {
            self.services.remove(&service_name);
        }

        Some(removed)
    }

    fn instance_count(&self) -> usize {
        self.index.len()
    }
}

/// 内存中的服务实例存储
///
/// 所有读写（包括后台清理）都经过同一把读写锁，任何调用都不会看到
/// 只更新了一半的服务列表。锁内只做内存操作，不做任何 I/O。
#[derive(Debug)]
pub struct RegistryStore {
    state: RwLock<RegistryState>,
    settings: RegistrySettings,
    clock: Arc<dyn Clock>,
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self::new(RegistrySettings::default())
    }
}

impl RegistryStore {
    pub fn new(settings: RegistrySettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: RegistrySettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> RegistrySettings {
        self.settings
    }

    // 注册新实例，总是分配新的 instance_id
    pub fn register(
        &self,
        service_name: &str,
        base_url: &str,
    ) -> Result<ServiceInstance, RegistryError> {
        validate_service_name(service_name)?;
        validate_base_url(base_url)?;

        let now = self.clock.now()?;
        let instance = {
            let mut state = self.write()?;

            let mut instance_id = InstanceId::new_v4();
            while state.index.contains_key(&instance_id) {
                instance_id = InstanceId::new_v4();
            }

            let instance = ServiceInstance {
                instance_id,
                service_name: service_name.to_string(),
                base_url: base_url.to_string(),
                registered_at: now,
                last_heartbeat: now,
            };

            state.index.insert(instance_id, service_name.to_string());
            state
                .services
                .entry(service_name.to_string())
                .or_default()
                .push(instance.clone());
            instance
        };

        tracing::info!(
            service_name = %instance.service_name,
            instance_id = %instance.instance_id,
            base_url = %instance.base_url,
            "Registered service instance"
        );

        Ok(instance)
    }

    // 更新心跳时间戳
    pub fn heartbeat(&self, instance_id: &str) -> Result<ServiceInstance, RegistryError> {
        let id = parse_instance_id(instance_id)?;
        let now = self.clock.now()?;

        let instance = {
            let mut state = self.write()?;
            let instance = state
                .find_mut(&id)
                .ok_or_else(|| RegistryError::not_found(instance_id))?;
            // 并发心跳可能以较旧的时间后到，取最大值保证单调
            instance.last_heartbeat = instance.last_heartbeat.max(now);
            instance.clone()
        };

        tracing::debug!(
            service_name = %instance.service_name,
            instance_id = %instance.instance_id,
            "Updated heartbeat for service instance"
        );

        Ok(instance)
    }

    // 注销实例，重复注销返回 InstanceNotFound
    pub fn deregister(&self, instance_id: &str) -> Result<ServiceInstance, RegistryError> {
        let id = parse_instance_id(instance_id)?;
        let removed = self
            .write()?
            .remove(&id)
            .ok_or_else(|| RegistryError::not_found(instance_id))?;

        tracing::info!(
            service_name = %removed.service_name,
            instance_id = %removed.instance_id,
            "Deregistered service instance"
        );

        Ok(removed)
    }

    // 按服务名查询，未知服务返回空列表
    pub fn lookup(&self, service_name: &str) -> Result<ServiceListing, RegistryError> {
        let state = self.read()?;
        let instances = state
            .services
            .get(service_name)
            .cloned()
            .unwrap_or_default();
        Ok(ServiceListing::new(service_name, instances))
    }

    pub fn list_all(&self) -> Result<BTreeMap<String, ServiceListing>, RegistryError> {
        let state = self.read()?;
        Ok(state
            .services
            .iter()
            .filter(|(_, instances)| !instances.is_empty())
            .map(|(name, instances)| {
                (name.clone(), ServiceListing::new(name.clone(), instances.clone()))
            })
            .collect())
    }

    pub fn status(&self) -> Result<RegistryStatus, RegistryError> {
        let state = self.read()?;
        let services: BTreeMap<String, usize> = state
            .services
            .iter()
            .filter(|(_, instances)| !instances.is_empty())
            .map(|(name, instances)| (name.clone(), instances.len()))
            .collect();

        Ok(RegistryStatus {
            total_services: services.len(),
            total_instances: state.instance_count(),
            services,
        })
    }

    /// 清理心跳超时的实例
    ///
    /// 超时判定为严格大于 `heartbeat_timeout`，恰好等于超时的实例保留。
    /// 时钟读取或锁获取失败时返回 `SweepCycleFailure`，存储保持不变。
    pub fn sweep_expired(&self) -> Result<SweepReport, RegistryError> {
        let now = self
            .clock
            .now()
            .map_err(|e| RegistryError::SweepCycleFailure {
                reason: e.to_string(),
            })?;
        let timeout = self.settings.heartbeat_timeout;

        let report = {
            let mut state = self
                .state
                .write()
                .map_err(|_| RegistryError::SweepCycleFailure {
                    reason: "registry lock poisoned".into(),
                })?;
            let RegistryState { services, index } = &mut *state;

            let mut evicted = Vec::new();
            services.retain(|_, instances| {
                instances.retain(|instance| {
                    if instance.is_expired(now, timeout) {
                        index.remove(&instance.instance_id);
                        evicted.push(instance.clone());
                        false
                    } else {
                        true
                    }
                });
                !instances.is_empty()
            });

            SweepReport {
                evicted,
                remaining: state.instance_count(),
            }
        };

        for instance in &report.evicted {
            tracing::warn!(
                service_name = %instance.service_name,
                instance_id = %instance.instance_id,
                elapsed_secs = instance.heartbeat_age(now).as_secs(),
                timeout_secs = timeout.as_secs(),
                "Service instance expired due to heartbeat timeout, removing from registry"
            );
        }

        Ok(report)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>, RegistryError> {
        self.state.read().map_err(|_| RegistryError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>, RegistryError> {
        self.state.write().map_err(|_| RegistryError::LockPoisoned)
    }
}

// 无法解析的ID不可能存在于注册表中，与未找到同等处理
fn parse_instance_id(raw: &str) -> Result<InstanceId, RegistryError> {
    raw.parse().map_err(|_| RegistryError::not_found(raw))
}

fn validate_service_name(service_name: &str) -> Result<(), RegistryError> {
    if service_name.trim().is_empty() {
        return Err(RegistryError::invalid("service_name", "must not be empty"));
    }
    Ok(())
}

fn validate_base_url(base_url: &str) -> Result<(), RegistryError> {
    if base_url.trim().is_empty() {
        return Err(RegistryError::invalid("base_url", "must not be empty"));
    }

    let uri: Uri = base_url
        .parse()
        .map_err(|e| RegistryError::invalid("base_url", format!("not a valid URL: {e}")))?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        _ => {
            return Err(RegistryError::invalid(
                "base_url",
                "scheme must be http or https",
            ));
        }
    }

    if uri.host().is_none_or(str::is_empty) {
        return Err(RegistryError::invalid("base_url", "missing host"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https_addresses() {
        assert!(validate_base_url("http://h1").is_ok());
        assert!(validate_base_url("https://users.internal:8443/api").is_ok());
        assert!(validate_base_url("http://127.0.0.1:8000").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for raw in ["", "   ", "users", "ftp://h1", "/relative/path", "http://"] {
            let err = validate_base_url(raw).unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidInput { field: "base_url", .. }),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_blank_service_names() {
        assert!(validate_service_name("users").is_ok());
        assert!(validate_service_name("").is_err());
        assert!(validate_service_name(" \t").is_err());
    }

    #[test]
    fn unparsable_ids_are_not_found() {
        let store = RegistryStore::default();
        assert!(store.heartbeat("not-a-uuid").unwrap_err().is_not_found());
        assert!(store.deregister("").unwrap_err().is_not_found());
    }
}
