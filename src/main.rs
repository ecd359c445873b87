mod generator;
mod store;
mod workload;

use crate::store::open_store;
use crate::workload::RunConfig;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Write/read load generator and content checker for a file store", long_about = None)]
struct Cli {
    #[arg(long, value_enum, default_value = "put")]
    mode: Mode,

    /// Files per thread, 0 runs until interrupted
    #[arg(short = 'c', long, default_value_t = 0)]
    count: u64,

    #[arg(short = 't', long, default_value_t = 5)]
    thread: u32,

    #[arg(long, default_value_t = 301)]
    seed: u32,

    /// File size in KiB
    #[arg(long, default_value_t = 1024)]
    file_size: u64,

    #[arg(long, value_enum, default_value = "mem")]
    store: StoreType,

    /// Backend location: root directory for `local`, database file for `redb`
    #[arg(long)]
    address: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Put,
    Read,
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Mode::Put => "Put",
            Mode::Read => "Read",
        })
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
// Update store::open_store when adding new variation
pub enum StoreType {
    Mem,
    Local,
    Redb,
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig> {
        let file_size = self
            .file_size
            .checked_mul(1024)
            .context("file size does not fit in 64 bits")?;
        Ok(RunConfig {
            mode: self.mode,
            count: self.count,
            threads: self.thread,
            seed: self.seed,
            file_size,
            report_interval: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.run_config()?;
    let store = open_store(cli.store, cli.address.as_deref())
        .with_context(|| format!("failed to open {:?} store", cli.store))?;

    let summary = workload::runner::run(store, &config)?;
    if config.count != 0 {
        println!("{summary}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["storemark"]).unwrap();
        let config = cli.run_config().unwrap();
        assert_eq!(config.mode, Mode::Put);
        assert_eq!(config.count, 0);
        assert_eq!(config.threads, 5);
        assert_eq!(config.seed, 301);
        assert_eq!(config.file_size, 1 << 20);
        assert!(matches!(cli.store, StoreType::Mem));
    }

    #[test]
    fn read_mode_flags() {
        let cli = Cli::try_parse_from([
            "storemark", "--mode", "read", "-c", "3", "-t", "1", "--file-size", "4", "--store", "redb",
            "--address", "/tmp/x.redb",
        ])
        .unwrap();
        let config = cli.run_config().unwrap();
        assert_eq!(config.mode, Mode::Read);
        assert_eq!(config.count, 3);
        assert_eq!(config.threads, 1);
        assert_eq!(config.file_size, 4096);
        assert_eq!(cli.address.as_deref(), Some("/tmp/x.redb"));
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["storemark", "--mode", "delete"]).is_err());
    }
}
