use dirs::home_dir;
use std::path::PathBuf;

use crate::error::TallyWalletError;

pub const ENV_DB_PATH: &str = "TALLY_DB_PATH";

const TALLY_DIR: &str = ".tally";

/// Returns the path to the wallet database file.
///
/// The path is taken from the `TALLY_DB_PATH` environment variable. If the variable is not set,
/// a `.tally` directory is created in the user's home directory and the path of a `wallet.db`
/// file inside it is returned.
pub fn db_path() -> Result<String, TallyWalletError> {
    match std::env::var(ENV_DB_PATH) {
        Ok(path) => Ok(path),
        Err(_) => Ok(config_dir()?
            .join("wallet.db")
            .to_string_lossy()
            .into_owned()),
    }
}

pub fn config_dir() -> Result<PathBuf, TallyWalletError> {
    let home = home_dir().ok_or_else(|| {
        TallyWalletError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "home dir not found",
        ))
    })?;
    let tally_dir = home.join(TALLY_DIR);
    if !tally_dir.exists() {
        std::fs::create_dir_all(&tally_dir)?;
    }
    Ok(tally_dir)
}
