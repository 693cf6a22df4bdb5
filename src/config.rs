//! Device configuration.
//!
//! With the `fs` feature, configuration can be loaded from a JSON file. A
//! missing file yields the defaults, and missing fields take their default
//! values.

use serde::{Deserialize, Serialize};

use blewire_const::CompanyId;

use crate::gap::{AdvParams, ConnParams, ScanParams};

/// Local device configuration.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// GAP device name and default complete local name.
    pub device_name: String,
    /// Company ID placed in the default manufacturer data.
    pub company_id: u16,
    /// Platform ID placed in the default manufacturer data.
    pub platform_id: u16,
    /// Maximum number of simultaneous links with the local device as
    /// peripheral.
    pub max_centrals: usize,
    /// Maximum number of simultaneous links with the local device as
    /// central.
    pub max_peripherals: usize,
    pub adv: AdvParams,
    pub scan: ScanParams,
    /// Peripheral preferred connection parameters.
    pub ppcp: ConnParams,
    /// Parameters used by the central to connect.
    pub conn: ConnParams,
}

impl Config {
    /// Returns the company ID.
    #[inline]
    #[must_use]
    pub const fn company(&self) -> CompanyId {
        CompanyId(self.company_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: "Blewire".to_owned(),
            company_id: CompanyId::PARTICLE.raw(),
            platform_id: 0,
            max_centrals: 1,
            max_peripherals: 3,
            adv: AdvParams::default(),
            scan: ScanParams::default(),
            ppcp: ConnParams::default(),
            conn: ConnParams::default(),
        }
    }
}

#[cfg(feature = "fs")]
pub use file::*;

#[cfg(feature = "fs")]
mod file {
    use std::path::{Path, PathBuf};
    use std::{fs, io};

    use tracing::debug;

    use super::Config;

    /// Configuration file error.
    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    pub enum Error {
        #[error("failed to access {}: {source}", .path.display())]
        Io { path: PathBuf, source: io::Error },
        #[error("invalid configuration in {}: {source}", .path.display())]
        Json {
            path: PathBuf,
            source: serde_json::Error,
        },
        #[error("user configuration directory not available")]
        NoUserDir,
    }

    impl Config {
        /// Name of the per-user configuration file.
        pub const FILE_NAME: &'static str = "blewire.json";

        /// Loads the configuration from `path`. Returns the defaults if the
        /// file does not exist.
        pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
            let path = path.as_ref();
            let s = match fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => {
                    debug!("No configuration at {}", path.display());
                    return Ok(Self::default());
                }
                Err(source) => {
                    let path = path.to_owned();
                    return Err(Error::Io { path, source });
                }
            };
            serde_json::from_str(&s).map_err(|source| Error::Json {
                path: path.to_owned(),
                source,
            })
        }

        /// Loads the configuration from the current user's configuration
        /// directory for application `app`.
        pub fn per_user(app: impl AsRef<Path>) -> Result<Self, Error> {
            Self::load(Self::user_path(app)?)
        }

        /// Returns the per-user configuration file path for application
        /// `app`.
        pub fn user_path(app: impl AsRef<Path>) -> Result<PathBuf, Error> {
            let dir = dirs::config_dir().ok_or(Error::NoUserDir)?;
            Ok(dir.join(app.as_ref()).join(Self::FILE_NAME))
        }

        /// Saves the configuration to `path`, creating parent directories as
        /// needed.
        pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
            let path = path.as_ref();
            let io_err = |source| Error::Io {
                path: path.to_owned(),
                source,
            };
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).map_err(io_err)?;
            }
            let s = serde_json::to_string_pretty(self).map_err(|source| Error::Json {
                path: path.to_owned(),
                source,
            })?;
            fs::write(path, s).map_err(io_err)?;
            debug!("Wrote: {}", path.display());
            Ok(())
        }
    }
}
