//! Table configuration parameters.

/// Configuration for one slab table (and its static twin).
///
/// Controls page sizing, growth limits, the allocation probe and the
/// family bound. Validated by the allocator's config at construction; all
/// values are immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableConfig {
    /// Number of slots per page.
    ///
    /// Default: 1024. Must be a non-zero power of two.
    pub page_capacity: u32,

    /// Maximum number of pages a table may append.
    ///
    /// Default: 4096, so each table addresses 4M slots. The page directory
    /// is allocated up front at this size (one pointer per page).
    pub max_pages: u32,

    /// How many existing slots `claim` inspects on the ring cursor before
    /// extending the table with a fresh slot.
    ///
    /// Default: 8.
    pub probe_limit: u32,

    /// Maximum number of named pointer types sharing one table.
    ///
    /// Default: 1024.
    pub family_capacity: u16,
}

impl TableConfig {
    /// Default slots per page.
    pub const DEFAULT_PAGE_CAPACITY: u32 = 1024;

    /// Default maximum page count.
    pub const DEFAULT_MAX_PAGES: u32 = 4096;

    /// Default ring probe length.
    pub const DEFAULT_PROBE_LIMIT: u32 = 8;

    /// Default family bound.
    pub const DEFAULT_FAMILY_CAPACITY: u16 = 1024;

    /// Total number of slots a table built from this config can hold.
    pub fn slot_capacity(&self) -> usize {
        self.page_capacity as usize * self.max_pages as usize
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_capacity: Self::DEFAULT_PAGE_CAPACITY,
            max_pages: Self::DEFAULT_MAX_PAGES,
            probe_limit: Self::DEFAULT_PROBE_LIMIT,
            family_capacity: Self::DEFAULT_FAMILY_CAPACITY,
        }
    }
}
