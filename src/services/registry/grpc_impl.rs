use tonic::{Request, Response, Status};

use super::service::{RegistryHandler, SERVICE_LABEL, ack};
use crate::registry::{
    DeregisterRequest, GetServiceRequest, HealthRequest, HealthResponse, HeartbeatRequest,
    InstanceAck, ListServicesRequest, ListServicesResponse, RegisterRequest, RegistryStatus,
    ServiceInstance, ServiceList, StatusRequest, registry_service_server::RegistryService,
};

// 为结构体实现 gRPC 服务 trait
#[tonic::async_trait]
impl RegistryService for RegistryHandler {
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<ServiceInstance>, Status> {
        let req = request.into_inner();
        let instance = self.store.register(&req.service_name, &req.base_url)?;
        Ok(Response::new(instance.into()))
    }

    async fn heartbeat(
        &self,
        request: Request<HeartbeatRequest>,
    ) -> Result<Response<InstanceAck>, Status> {
        let req = request.into_inner();
        let instance = self.store.heartbeat(&req.instance_id)?;
        Ok(Response::new(ack(&instance)))
    }

    async fn deregister(
        &self,
        request: Request<DeregisterRequest>,
    ) -> Result<Response<InstanceAck>, Status> {
        let req = request.into_inner();
        let instance = self.store.deregister(&req.instance_id)?;
        Ok(Response::new(ack(&instance)))
    }

    async fn get_service(
        &self,
        request: Request<GetServiceRequest>,
    ) -> Result<Response<ServiceList>, Status> {
        let req = request.into_inner();
        let listing = self.store.lookup(&req.service_name)?;
        Ok(Response::new(listing.into()))
    }

    async fn list_services(
        &self,
        _request: Request<ListServicesRequest>,
    ) -> Result<Response<ListServicesResponse>, Status> {
        let services = self
            .store
            .list_all()?
            .into_iter()
            .map(|(name, listing)| (name, listing.into()))
            .collect();
        Ok(Response::new(ListServicesResponse { services }))
    }

    async fn get_status(
        &self,
        _request: Request<StatusRequest>,
    ) -> Result<Response<RegistryStatus>, Status> {
        let status = self.store.status()?;
        Ok(Response::new(status.into()))
    }

    async fn health(
        &self,
        _request: Request<HealthRequest>,
    ) -> Result<Response<HealthResponse>, Status> {
        Ok(Response::new(HealthResponse {
            status: "ok".into(),
            service: SERVICE_LABEL.into(),
        }))
    }
}
