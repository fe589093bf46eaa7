use anyhow::Context;
use clap::Parser;
use snowstorm::{Pool, Source, base36};
use snowstorm_http::{
    HttpSource,
    client::config::{CliArgs, ClientConfig},
    telemetry::init_telemetry,
};
use std::{
    io::{BufWriter, Write},
    sync::Arc,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ClientConfig::try_from(args)?;

    init_telemetry()?;

    // A single source rotates over every host. Monotonic merging needs each
    // bucket to see one host only.
    let sources: Vec<Arc<dyn Source>> = if config.monotonic {
        config
            .hosts
            .iter()
            .map(|host| Ok(Arc::new(HttpSource::new([host])?) as Arc<dyn Source>))
            .collect::<snowstorm_http::Result<_>>()?
    } else {
        vec![Arc::new(HttpSource::new(&config.hosts)?) as Arc<dyn Source>]
    };

    let mut builder = Pool::builder()
        .buffer_size(config.buffer_size)
        .workers(config.workers)
        .sources(sources);
    if config.monotonic {
        builder = builder.monotonic();
    }
    let pool = builder.build()?;

    tracing::debug!(
        "Pulling {} ids from {} hosts ({:?})",
        config.count,
        config.hosts.len(),
        pool.topology()
    );

    let mut out = BufWriter::new(std::io::stdout().lock());
    for _ in 0..config.count {
        let id = pool.next_id().await.context("pool closed")?;
        if config.base36 {
            writeln!(out, "{}", base36::encode(id))?;
        } else {
            writeln!(out, "{id}")?;
        }
    }
    out.flush()?;
    drop(out);

    pool.close().await;
    Ok(())
}
