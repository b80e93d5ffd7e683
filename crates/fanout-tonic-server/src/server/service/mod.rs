//! gRPC services. The REST gateway calls into the same types.

pub mod greeter;
pub mod lifecycle;
pub mod status;
