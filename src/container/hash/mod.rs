pub mod hash_table;
pub mod linear_probe_hash_table;

/// Outcome of one insert probe over the slot space.
pub enum FindSlotResult<T> {
    /// A full revolution completed without finding a usable slot.
    NotFound,

    /// The exact pair already sits in the table.
    Duplicated,

    Found(T),
}
