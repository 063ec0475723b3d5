//! Backpressure tunnel demo.
//!
//! Binds an in-memory server behind a facade, accepts a few children, and
//! pumps data through each one. Producers pause whenever their child's
//! outbound queue rises above the high watermark and resume once a slow
//! consumer drains it to the low watermark. Afterwards the server is closed,
//! every child is closed through the group, and the facade's event log is
//! printed.
//!
//! Watermarks come from `BURROW_WRITE_BUFFER_LOW_WATER_MARK` and
//! `BURROW_WRITE_BUFFER_HIGH_WATER_MARK`; `RUST_LOG` controls logging.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burrow_core::{
    Channel, ChannelGroup, ChannelIds, FacadeChannel, PipelineError, PipelineFactory,
    ServerChannelHandler, TunnelConfig,
};
use burrow_transport_mem::{MemChannel, MemServer, TransportError};

const CHILDREN: usize = 3;
const CHUNK_SIZE: usize = 4 * 1024;
const CHUNKS_PER_CHILD: usize = 256;

#[derive(Debug, Default)]
struct Stats {
    sent: usize,
    pauses: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,burrow_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = TunnelConfig::from_env();
    let addr: SocketAddr = "127.0.0.1:4000".parse()?;
    tracing::info!(
        low = config.watermarks.low,
        high = config.watermarks.high,
        "starting backpressure tunnel"
    );

    let ids = Arc::new(ChannelIds::new());
    let (facade, mut facade_events) = FacadeChannel::new(ids.next_id());
    let facade = Arc::new(facade);
    let group = Arc::new(ChannelGroup::new("tunnel-children"));
    let pipeline: Arc<dyn PipelineFactory> =
        Arc::new(|channel: &dyn Channel| -> Result<(), PipelineError> {
            tracing::debug!(channel = %channel.id(), "installing tunnel pipeline");
            Ok(())
        });
    let handler = Arc::new(ServerChannelHandler::new(
        facade.clone(),
        pipeline,
        group.clone(),
    ));

    let server = MemServer::bind(addr, handler, ids, config)?;

    let mut pumps = Vec::with_capacity(CHILDREN);
    for _ in 0..CHILDREN {
        let child = server.accept()?;
        let producer = tokio::spawn(produce(child.clone()));
        let consumer = tokio::spawn(consume(child.clone()));
        pumps.push((child, producer, consumer));
    }

    for (child, producer, consumer) in pumps {
        let stats = producer.await??;
        let received = consumer.await?;
        tracing::info!(
            child = %child.id(),
            sent = stats.sent,
            received,
            pauses = stats.pauses,
            "child finished"
        );
    }

    // Every ChildAccepted is delivered once the driver has stopped.
    server.close();
    server.join().await;

    let closed = group.close_all();
    tracing::info!(closed, remaining = group.len(), "closed all children");
    group.clear();

    println!("facade {} event log:", facade.id());
    for event in facade_events.drain() {
        println!("  {event:?}");
    }
    Ok(())
}

/// Write `CHUNKS_PER_CHILD` chunks, parking while the child is unwritable.
async fn produce(child: Arc<MemChannel>) -> Result<Stats, TransportError> {
    let mut writability = child.writability();
    let mut stats = Stats::default();
    let chunk = Bytes::from(vec![0xAB; CHUNK_SIZE]);

    for _ in 0..CHUNKS_PER_CHILD {
        if !child.is_writable() {
            stats.pauses += 1;
            tracing::debug!(
                child = %child.id(),
                pending = child.outbound().pending_bytes(),
                "paused on backpressure"
            );
            writability
                .wait_for(|writable| *writable)
                .await
                .map_err(|_| TransportError::Closed)?;
        }
        child.write(chunk.clone())?;
        stats.sent += 1;
    }
    Ok(stats)
}

/// Drain the child's outbound queue more slowly than it fills.
async fn consume(child: Arc<MemChannel>) -> usize {
    let mut received = 0;
    while received < CHUNKS_PER_CHILD {
        match child.take_outbound() {
            Some(_) => {
                received += 1;
                if received % 4 == 0 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
            None => tokio::task::yield_now().await,
        }
    }
    received
}
