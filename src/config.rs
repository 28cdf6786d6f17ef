use log::{info, warn};
use std::{
    env,
    fmt::{Debug, Display},
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::store::RecordStore;

/// Deployment settings, read once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the four `.xlsx` stores
    pub data_dir: PathBuf,
    /// Directory the credential PNGs are written to
    pub credential_dir: PathBuf,
    /// Address the web server listens on
    pub bind_addr: String,
    /// Reject a registration whose email is already on file
    pub unique_emails: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            credential_dir: PathBuf::from("qr_codes"),
            bind_addr: "127.0.0.1:3000".to_string(),
            unique_emails: false,
        }
    }
}

impl Config {
    /// Read `SHOPFLOOR_*` environment variables, falling back to defaults
    pub fn load() -> Self {
        let data_dir = try_load("SHOPFLOOR_DATA_DIR", PathBuf::from("."));
        let credential_dir = resolve_credential_dir(&data_dir, var("SHOPFLOOR_QR_DIR"));

        Self {
            credential_dir,
            bind_addr: try_load("SHOPFLOOR_BIND", "127.0.0.1:3000".to_string()),
            unique_emails: try_load("SHOPFLOOR_UNIQUE_EMAILS", false),
            data_dir,
        }
    }

    /// Config rooted at a single directory, credentials in `<dir>/qr_codes`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let data_dir = dir.into();
        Self {
            credential_dir: data_dir.join("qr_codes"),
            data_dir,
            ..Self::default()
        }
    }

    pub fn record_store(&self) -> RecordStore {
        RecordStore::new(&self.data_dir)
    }
}

/// `SHOPFLOOR_QR_DIR` if set, otherwise `qr_codes` inside the data directory
fn resolve_credential_dir(data_dir: &Path, configured: Option<String>) -> PathBuf {
    match configured {
        Some(dir) => PathBuf::from(dir),
        None => data_dir.join("qr_codes"),
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Debug,
    T::Err: Display,
{
    let Some(raw) = var(key) else {
        info!("{key} not set, using default: {default:?}");
        return default;
    };

    raw.parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}; using default: {default:?}");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_dir_nests_credentials() {
        let config = Config::in_dir("/srv/plant");
        assert_eq!(config.data_dir, PathBuf::from("/srv/plant"));
        assert_eq!(config.credential_dir, PathBuf::from("/srv/plant/qr_codes"));
        assert!(!config.unique_emails);
    }

    #[test]
    fn credentials_default_inside_the_data_dir() {
        let data_dir = Path::new("/srv/plant");
        assert_eq!(
            resolve_credential_dir(data_dir, None),
            PathBuf::from("/srv/plant/qr_codes")
        );
        assert_eq!(
            resolve_credential_dir(data_dir, Some("/mnt/badges".into())),
            PathBuf::from("/mnt/badges")
        );
    }

    #[test]
    fn unset_values_fall_back_to_default() {
        let flag = try_load("SHOPFLOOR_TEST_UNSET_FLAG", false);
        assert!(!flag);
    }
}
