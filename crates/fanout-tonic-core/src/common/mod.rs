//! Protocol bindings, conversions and errors shared by server and client.

pub mod error;
pub mod types;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from `proto/fanout.proto`.
///
/// ## Services
///
/// - `Greeter` - `SayHello` greets a caller by name.
/// - `StatusAggregator` - `GetStatus` (unary) and `StreamStatus` (server
///   streaming) fan a request out into concurrent units.
pub mod proto {
    tonic::include_proto!("fanout");

    /// Encoded file descriptor set for registering gRPC reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("fanout_descriptor");
}
