//! Purpose: Resolve endpoint configuration from flags and environment.
//! Exports: `Endpoints`, env var names, `default_data_file`.
//! Role: Keep CLI and server configuration semantics in one place.
//! Invariants: An explicit flag always wins over its environment variable.
//! Invariants: Credentials and URLs never have baked-in defaults.

use leafsync::api::{Error, ErrorKind};
use std::path::PathBuf;

pub const ENV_METADATA_URL: &str = "LEAFSYNC_METADATA_URL";
pub const ENV_MIRROR_URL: &str = "LEAFSYNC_MIRROR_URL";
pub const ENV_TOKEN: &str = "LEAFSYNC_TOKEN";

#[derive(Clone, Debug, Default)]
pub struct Endpoints {
    pub metadata_url: Option<String>,
    pub mirror_url: Option<String>,
    pub token: Option<String>,
}

impl Endpoints {
    pub fn resolve(
        metadata_flag: Option<String>,
        mirror_flag: Option<String>,
        token_flag: Option<String>,
    ) -> Self {
        Self {
            metadata_url: metadata_flag.or_else(|| env_non_empty(ENV_METADATA_URL)),
            mirror_url: mirror_flag.or_else(|| env_non_empty(ENV_MIRROR_URL)),
            token: token_flag.or_else(|| env_non_empty(ENV_TOKEN)),
        }
    }

    pub fn require_metadata(&self) -> Result<&str, Error> {
        self.metadata_url.as_deref().ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("metadata service url is not configured")
                .with_hint(format!("Pass --metadata-url or set {ENV_METADATA_URL}."))
        })
    }

    pub fn require_mirror(&self) -> Result<&str, Error> {
        self.mirror_url.as_deref().ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("mirror url is not configured")
                .with_hint(format!("Pass --mirror-url or set {ENV_MIRROR_URL}."))
        })
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

pub fn default_data_file() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".leafsync").join("leaves.json")
}
