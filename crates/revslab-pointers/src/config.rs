//! Allocator configuration, validation, and error types.
//!
//! [`PointersConfig`] is the builder input for [`Pointers`](crate::Pointers).
//! [`validate()`](PointersConfig::validate) checks structural invariants at
//! construction time so that no table operation has to.

use std::error::Error;
use std::fmt;

use revslab_table::TableConfig;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`PointersConfig::validate()`] or when
/// installing the process-wide allocator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `page_capacity` is zero or not a power of two.
    InvalidPageCapacity {
        /// The configured value.
        configured: u32,
    },
    /// `max_pages` is zero.
    NoPages,
    /// `page_capacity * max_pages` does not fit the 32-bit address space.
    AddressSpaceOverflow {
        /// Total slots requested.
        slots: usize,
    },
    /// `probe_limit` is zero.
    ProbeLimitZero,
    /// `family_capacity` is zero.
    FamilyCapacityZero,
    /// `max_generation_age` is zero, which would make every slot stale as
    /// soon as the cycle advances.
    MaxGenerationAgeZero,
    /// The process-wide allocator was already built.
    AlreadyInstalled,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPageCapacity { configured } => {
                write!(
                    f,
                    "page_capacity must be a non-zero power of two, got {configured}"
                )
            }
            Self::NoPages => write!(f, "max_pages must be at least 1"),
            Self::AddressSpaceOverflow { slots } => {
                write!(f, "{slots} slots per table exceed the 32-bit address space")
            }
            Self::ProbeLimitZero => write!(f, "probe_limit must be at least 1"),
            Self::FamilyCapacityZero => write!(f, "family_capacity must be at least 1"),
            Self::MaxGenerationAgeZero => write!(f, "max_generation_age must be at least 1"),
            Self::AlreadyInstalled => write!(f, "the global pointer allocator is already installed"),
        }
    }
}

impl Error for ConfigError {}

// ── PointersConfig ─────────────────────────────────────────────────

/// Configuration for a [`Pointers`](crate::Pointers) allocator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointersConfig {
    /// Page sizing and limits shared by every table.
    pub table: TableConfig,

    /// Staleness threshold, in generations.
    ///
    /// A live, unpinned slot last stamped at generation `a` is stale once
    /// `a < now - max_generation_age`. Stale slots are reclaimed by
    /// `mark_and_sweep` and, with `recycle_on_new`, recycled by `alloc`.
    /// Default: 2.
    pub max_generation_age: u64,

    /// Whether `alloc` may recycle stale live slots it finds on its ring
    /// probe (running their `Free` callback) before extending a table.
    /// Default: `true`.
    pub recycle_on_new: bool,
}

impl PointersConfig {
    /// Default staleness threshold.
    pub const DEFAULT_MAX_GENERATION_AGE: u64 = 2;

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let table = &self.table;
        if !table.page_capacity.is_power_of_two() {
            return Err(ConfigError::InvalidPageCapacity {
                configured: table.page_capacity,
            });
        }
        if table.max_pages == 0 {
            return Err(ConfigError::NoPages);
        }
        // Addresses are index + 1, so the last index must stay below u32::MAX.
        let slots = table.slot_capacity();
        if slots > u32::MAX as usize {
            return Err(ConfigError::AddressSpaceOverflow { slots });
        }
        if table.probe_limit == 0 {
            return Err(ConfigError::ProbeLimitZero);
        }
        if table.family_capacity == 0 {
            return Err(ConfigError::FamilyCapacityZero);
        }
        if self.max_generation_age == 0 {
            return Err(ConfigError::MaxGenerationAgeZero);
        }
        Ok(())
    }
}

impl Default for PointersConfig {
    fn default() -> Self {
        Self {
            table: TableConfig::default(),
            max_generation_age: Self::DEFAULT_MAX_GENERATION_AGE,
            recycle_on_new: true,
        }
    }
}
