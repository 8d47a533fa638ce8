use super::error::RegistryClientError;
use super::registration::RegistryClient;

impl RegistryClient {
    /// 返回服务第一个实例的地址，服务不存在或没有实例时返回 `None`
    pub async fn get_service_url(
        &mut self,
        service_name: &str,
    ) -> Result<Option<String>, RegistryClientError> {
        let listing = self.get_service(service_name).await?;
        let base_url = listing
            .instances
            .into_iter()
            .next()
            .map(|instance| instance.base_url);

        if base_url.is_none() {
            tracing::debug!(service_name = %service_name, "No instances available for service");
        }

        Ok(base_url)
    }
}
