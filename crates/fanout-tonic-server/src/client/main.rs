//! Demo client: greets the server, then streams one status request.
//!
//! ```bash
//! cargo run --bin fanout-client -- --units 5 --cancel-after-ms 3000
//! ```

use clap::Parser;
use core::time::Duration;
use fanout_tonic_core::{
    proto::{
        HelloRequest, StatusRequest, greeter_client::GreeterClient,
        status_aggregator_client::StatusAggregatorClient,
    },
    types::unit_state,
};
use futures::StreamExt;
use std::time::Instant;
use tonic::{Request, codec::CompressionEncoding, transport::Channel};

#[derive(Parser, Debug)]
#[command(name = "fanout-client", version, about = "Calls a running fanout-tonic-server")]
struct ClientArgs {
    /// Server URI.
    #[arg(long, env = "FANOUT_ADDR", default_value = "http://127.0.0.1:8080")]
    addr: String,

    /// Name sent to `SayHello`.
    #[arg(long, default_value = "world")]
    name: String,

    /// Units to request. The server default applies when omitted.
    #[arg(long)]
    units: Option<u32>,

    /// Drop the status stream after this many milliseconds, cancelling the
    /// units that are still running.
    #[arg(long)]
    cancel_after_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = ClientArgs::parse();

    let channel = Channel::from_shared(args.addr.clone())?.connect().await?;

    let mut greeter = GreeterClient::new(channel.clone());
    let mut hello = Request::new(HelloRequest { name: args.name });
    hello.set_timeout(Duration::from_secs(1));
    let reply = greeter.say_hello(hello).await?.into_inner();
    println!("{}", reply.message);

    let mut status = StatusAggregatorClient::new(channel)
        .send_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Zstd);
    let mut stream = status
        .stream_status(StatusRequest { units: args.units })
        .await?
        .into_inner();

    let start = Instant::now();
    let cutoff = async {
        match args.cancel_after_ms {
            Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(cutoff);

    let mut received = 0;
    loop {
        tokio::select! {
            () = &mut cutoff => {
                println!(
                    "Cancelling after {:?} with {received} results; the server relabels the rest",
                    start.elapsed()
                );
                break;
            }
            next = stream.next() => match next {
                Some(unit) => {
                    let unit = unit?;
                    let state = unit_state(unit.state)
                        .map_or("unspecified", |state| state.as_str());
                    println!(
                        "[{:?}] {:<8} {:<9} {}",
                        start.elapsed(),
                        unit.unit_id,
                        state,
                        unit.message
                    );
                    received += 1;
                }
                None => {
                    println!("done: {received} results in {:?}", start.elapsed());
                    break;
                }
            }
        }
    }

    Ok(())
}
