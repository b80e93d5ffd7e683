#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use fanout_tonic_core::proto::{
    FILE_DESCRIPTOR_SET, greeter_server::GreeterServer,
    status_aggregator_server::StatusAggregatorServer,
};
use server::config::{CliArgs, ServerConfig};
use server::rest::{AppState, router};
use server::service::{greeter::GreeterService, status::StatusService};
use server::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::{codec::CompressionEncoding, transport::Server};
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let status = StatusService::new(&config)?;
    let grpc_listener = TcpListener::bind(config.grpc_addr).await?;
    let rest_listener = TcpListener::bind(config.rest_addr).await?;
    log_startup_info(&config);

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<GreeterServer<GreeterService>>()
        .await;
    health_reporter
        .set_serving::<StatusAggregatorServer<StatusService>>()
        .await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    // Fired once the aggregation machinery has been shut down; both servers
    // then stop accepting connections and finish what they are serving.
    let stop = CancellationToken::new();

    let grpc = Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_service(reflection)
        .add_service(build_greeter_service(GreeterService))
        .add_service(build_status_service(status.clone()))
        .serve_with_incoming_shutdown(
            TcpListenerStream::new(grpc_listener),
            stop.clone().cancelled_owned(),
        );

    let rest = axum::serve(
        rest_listener,
        router(AppState {
            status: status.clone(),
        }),
    )
    .with_graceful_shutdown(stop.clone().cancelled_owned());

    tokio::spawn(shutdown_signal(status, health_reporter, stop));

    tokio::try_join!(
        async { grpc.await.map_err(anyhow::Error::from) },
        async { rest.await.map_err(anyhow::Error::from) },
    )?;

    providers.shutdown();
    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting gRPC on {} and REST on {} with full config: {:#?}",
            config.grpc_addr,
            config.rest_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting gRPC on {} and REST on {} ({} units per request, {:?} cancel mode)",
            config.grpc_addr,
            config.rest_addr,
            config.status_units,
            config.aggregator.cancel_mode
        );
    }
}

fn build_greeter_service(service: GreeterService) -> GreeterServer<GreeterService> {
    GreeterServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

fn build_status_service(service: StatusService) -> StatusAggregatorServer<StatusService> {
    StatusAggregatorServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

async fn shutdown_signal(
    status: StatusService,
    health_reporter: HealthReporter,
    stop: CancellationToken,
) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");

    // 1. Publish the status
    health_reporter
        .set_not_serving::<GreeterServer<GreeterService>>()
        .await;
    health_reporter
        .set_not_serving::<StatusAggregatorServer<StatusService>>()
        .await;

    // 2. Refuse, drain, then cancel aggregations
    status.shutdown().await;

    // 3. Stop both listeners
    stop.cancel();
}
