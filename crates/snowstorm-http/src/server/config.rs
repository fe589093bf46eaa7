use anyhow::{Context, bail};
use clap::Parser;
use std::net::SocketAddr;

/// Runtime configuration for the `snowstorm-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is honoured).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "snowstorm-server",
    version,
    about = "An HTTP service handing out Snowflake-style IDs"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:7006"))]
    pub server_addr: String,

    /// Server id embedded in every ID. It must be unique among live servers
    /// sharing a layout; each route masks it to its own server field.
    ///
    /// Environment variable: `SERVER_ID`
    #[arg(long, env = "SERVER_ID", default_value_t = 0)]
    pub server_id: i64,

    /// Maximum number of IDs allowed per request.
    ///
    /// Environment variable: `MAX_IDS_PER_REQUEST`
    #[arg(long, env = "MAX_IDS_PER_REQUEST", default_value_t = 512)]
    pub max_ids_per_request: usize,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: SocketAddr,
    pub server_id: i64,
    pub max_ids_per_request: usize,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let server_addr = args.server_addr.parse().with_context(|| {
            format!("SERVER_ADDR ({}) is not a socket address", args.server_addr)
        })?;

        if args.server_id < 0 {
            bail!("SERVER_ID must not be negative, got {}", args.server_id);
        }

        if args.max_ids_per_request == 0 {
            bail!("MAX_IDS_PER_REQUEST must be greater than 0");
        }

        Ok(Self {
            server_addr,
            server_id: args.server_id,
            max_ids_per_request: args.max_ids_per_request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> CliArgs {
        CliArgs::parse_from(core::iter::once("snowstorm-server").chain(list.iter().copied()))
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::try_from(args(&[])).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:7006".parse().unwrap());
        assert_eq!(config.server_id, 0);
        assert_eq!(config.max_ids_per_request, 512);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ServerConfig::try_from(args(&["--server-addr", "nowhere"])).is_err());
        assert!(ServerConfig::try_from(args(&["--server-id=-1"])).is_err());
        assert!(ServerConfig::try_from(args(&["--max-ids-per-request", "0"])).is_err());
    }
}
