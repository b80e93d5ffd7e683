use crate::server::telemetry::{increment_request_errors, increment_requests};
use fanout_tonic_core::{
    Error,
    proto::{HelloReply, HelloRequest, greeter_server::Greeter},
};
use tonic::{Request, Response, Status};

/// Builds the greeting for `name`.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] if `name` is empty or only whitespace.
pub fn greet(name: &str) -> Result<String, Error> {
    if name.trim().is_empty() {
        return Err(Error::invalid_request("name: must not be blank"));
    }
    Ok(format!("Hello, {name}!"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GreeterService;

#[tonic::async_trait]
impl Greeter for GreeterService {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn say_hello(
        &self,
        req: Request<HelloRequest>,
    ) -> Result<Response<HelloReply>, Status> {
        increment_requests();
        let message = greet(&req.get_ref().name).inspect_err(|_| increment_request_errors())?;
        tracing::debug!("Greeted {}", req.get_ref().name);
        Ok(Response::new(HelloReply { message }))
    }
}
