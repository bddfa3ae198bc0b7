//! One table of each shape, plus their static twins.

use crate::config::TableConfig;
use crate::shape::Shape;
use crate::static_table::StaticTable;
use crate::table::Table;

/// The full storage of one allocator: a slab table and a static table
/// for each payload shape.
///
/// Fields are crate-visible so [`Shape`] can select them; callers go
/// through [`TableSet::table`] and [`TableSet::statics`].
pub struct TableSet {
    pub(crate) one: Table<[u64; 1]>,
    pub(crate) two: Table<[u64; 2]>,
    pub(crate) three: Table<[u64; 3]>,
    pub(crate) static_one: StaticTable<[u64; 1]>,
    pub(crate) static_two: StaticTable<[u64; 2]>,
    pub(crate) static_three: StaticTable<[u64; 3]>,
}

impl TableSet {
    /// Create empty tables for every shape.
    pub fn new(config: &TableConfig) -> Self {
        Self {
            one: Table::new(config),
            two: Table::new(config),
            three: Table::new(config),
            static_one: StaticTable::new(config),
            static_two: StaticTable::new(config),
            static_three: StaticTable::new(config),
        }
    }

    /// The slab table for shape `S`.
    pub fn table<S: Shape>(&self) -> &Table<S> {
        S::table(self)
    }

    /// The static table for shape `S`.
    pub fn statics<S: Shape>(&self) -> &StaticTable<S> {
        S::statics(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_select_distinct_tables() {
        let set = TableSet::new(&TableConfig {
            page_capacity: 4,
            max_pages: 2,
            ..TableConfig::default()
        });
        set.statics::<[u64; 1]>().add([1]).unwrap();
        set.statics::<[u64; 3]>().add([1, 2, 3]).unwrap();
        set.statics::<[u64; 3]>().add([4, 5, 6]).unwrap();
        assert_eq!(set.statics::<[u64; 1]>().len(), 1);
        assert_eq!(set.statics::<[u64; 2]>().len(), 0);
        assert_eq!(set.statics::<[u64; 3]>().len(), 2);
        assert_eq!(set.table::<[u64; 2]>().used(), 0);
    }
}
