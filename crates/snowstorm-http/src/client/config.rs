use anyhow::bail;
use clap::Parser;
use snowstorm::{DEFAULT_BUFFER_SIZE, DEFAULT_WORKERS, MAX_BUFFER_SIZE, MAX_WORKERS};

/// Runtime configuration for the `snowstorm-client` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "snowstorm-client",
    version,
    about = "Pulls IDs from snowstorm servers through a prefetching pool"
)]
pub struct CliArgs {
    /// Comma separated server URLs, each including the layout path, e.g.
    /// `http://10.0.0.1:7006/10/12`.
    ///
    /// Environment variable: `HOSTS`
    #[arg(long, env = "HOSTS", value_delimiter = ',', required = true)]
    pub hosts: Vec<String>,

    /// Number of IDs to print before exiting.
    ///
    /// Environment variable: `COUNT`
    #[arg(short = 'n', long, env = "COUNT", default_value_t = 10)]
    pub count: usize,

    /// Fetch loops in FIFO mode; fetch loops per host in monotonic mode.
    ///
    /// Environment variable: `WORKERS`
    #[arg(long, env = "WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Number of IDs buffered locally.
    ///
    /// Environment variable: `BUFFER_SIZE`
    #[arg(long, env = "BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Merge per-host buckets so the printed IDs never decrease.
    ///
    /// Environment variable: `MONOTONIC`
    #[arg(long, env = "MONOTONIC", default_value_t = false)]
    pub monotonic: bool,

    /// Print IDs in base36 instead of decimal.
    ///
    /// Environment variable: `BASE36`
    #[arg(long, env = "BASE36", default_value_t = false)]
    pub base36: bool,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub hosts: Vec<String>,
    pub count: usize,
    pub workers: usize,
    pub buffer_size: usize,
    pub monotonic: bool,
    pub base36: bool,
}

impl TryFrom<CliArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let hosts: Vec<String> = args
            .hosts
            .into_iter()
            .map(|host| host.trim().to_owned())
            .filter(|host| !host.is_empty())
            .collect();

        if hosts.is_empty() {
            bail!("HOSTS must name at least one server");
        }

        if !(1..=MAX_WORKERS).contains(&args.workers) {
            bail!(
                "WORKERS ({}) must be between 1 and {MAX_WORKERS}",
                args.workers
            );
        }

        if !(1..=MAX_BUFFER_SIZE).contains(&args.buffer_size) {
            bail!(
                "BUFFER_SIZE ({}) must be between 1 and {MAX_BUFFER_SIZE}",
                args.buffer_size
            );
        }

        Ok(Self {
            hosts,
            count: args.count,
            workers: args.workers,
            buffer_size: args.buffer_size,
            monotonic: args.monotonic,
            base36: args.base36,
        })
    }
}
