//! Runtime settings of the wallet, read from command line flags or the environment.

use std::path::PathBuf;

use clap::Parser;

use crate::{config_path, error::TallyWalletError};

/// Where the wallet keeps its database.
#[derive(Debug, Clone, Default, Parser)]
pub struct WalletConfig {
    /// directory of `wallet.db`, defaults to `~/.tally`
    #[clap(short, long, env = "TALLY_DB_DIR")]
    pub db_dir: Option<PathBuf>,
}

impl WalletConfig {
    pub fn db_path(&self) -> Result<String, TallyWalletError> {
        match &self.db_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Ok(dir.join("wallet.db").to_string_lossy().to_string())
            }
            None => config_path::db_path(),
        }
    }
}

/// Polling of a freshly created deposit invoice until the mint reports it paid.
#[derive(Debug, Clone, Parser)]
pub struct PollConfig {
    #[clap(long = "poll-attempts", default_value_t = 10, env = "TALLY_POLL_ATTEMPTS")]
    pub attempts: u32,
    #[clap(long = "poll-interval-secs", default_value_t = 5, env = "TALLY_POLL_INTERVAL_SECS")]
    pub interval_secs: u64,
}

impl PollConfig {
    pub const fn new(attempts: u32, interval_secs: u64) -> Self {
        Self {
            attempts,
            interval_secs,
        }
    }

    pub const fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(10, 5)
    }
}

/// Which rails the payment router may use and how it estimates their fees.
#[derive(Debug, Clone, Parser)]
pub struct RouterConfig {
    #[clap(
        long,
        default_value_t = true,
        env = "TALLY_ECASH_ENABLED",
        action = clap::ArgAction::Set
    )]
    pub ecash_enabled: bool,
    #[clap(
        long,
        default_value_t = true,
        env = "TALLY_LIGHTNING_ENABLED",
        action = clap::ArgAction::Set
    )]
    pub lightning_enabled: bool,
    /// flat routing fee estimate of the lightning rail in sats
    #[clap(long, default_value_t = 4, env = "TALLY_LIGHTNING_FEE_BASE")]
    pub lightning_fee_base: u64,
    #[clap(long, default_value_t = 0.5, env = "TALLY_LIGHTNING_FEE_PERCENT")]
    pub lightning_fee_percent: f64,
    /// added on top of the swap fees of the liquid rail
    #[clap(long, default_value_t = 50, env = "TALLY_LIQUID_DEFAULT_FEE")]
    pub liquid_default_fee: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            ecash_enabled: true,
            lightning_enabled: true,
            lightning_fee_base: 4,
            lightning_fee_percent: 0.5,
            liquid_default_fee: 50,
        }
    }
}
