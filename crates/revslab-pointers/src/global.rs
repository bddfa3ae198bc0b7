//! The process-wide allocator.
//!
//! Binding layers that cannot thread a context through every call use the
//! shared instance. It is built on first use with the default
//! configuration unless [`install`] ran first.

use std::sync::OnceLock;

use log::debug;

use crate::config::{ConfigError, PointersConfig};
use crate::pointers::Pointers;

static GLOBAL: OnceLock<Pointers> = OnceLock::new();

/// The process-wide allocator, built with defaults on first use.
pub fn global() -> &'static Pointers {
    GLOBAL.get_or_init(Pointers::default)
}

/// Build the process-wide allocator from `config`.
///
/// Must run before anything calls [`global`]. Returns
/// `Err(ConfigError::AlreadyInstalled)` if the allocator already exists,
/// and the validation error if `config` is invalid.
pub fn install(config: PointersConfig) -> Result<&'static Pointers, ConfigError> {
    let pointers = Pointers::new(config)?;
    GLOBAL
        .set(pointers)
        .map_err(|_| ConfigError::AlreadyInstalled)?;
    debug!("installed global pointer allocator");
    Ok(global())
}
