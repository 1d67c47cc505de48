//! Static catalog of job operations.
//!
//! Every [`OperationKind`] has exactly one [`RegistryEntry`] describing its
//! scope, whether a repeat is safe, and which facet of a job it mutates. Each
//! kind also owns three action identifiers (`*_REQUEST`, `*_SUCCESS`,
//! `*_ERROR`) that observers receive as the operation moves through its
//! phases.
//!
//! The table is immutable and shared by every caller.

pub mod entry;
pub mod kind;

pub use entry::{Facet, RegistryEntry, Scope};
pub use kind::{ActionPhase, ActionType, OperationKind};

use crate::error::Result;

/// Look up the entry for a kind.
pub fn describe(kind: OperationKind) -> &'static RegistryEntry {
    &entry::ENTRIES[kind as usize]
}

/// Look up an entry by its kind name (`"fetch_all"`) or by any of its action
/// identifiers (`"FETCH_JOBS_REQUEST"`).
///
/// # Errors
///
/// Returns `UnknownOperationKind` when the name matches neither form.
pub fn describe_name(name: &str) -> Result<&'static RegistryEntry> {
    let kind = match name.parse::<OperationKind>() {
        Ok(kind) => kind,
        Err(_) => name.parse::<ActionType>()?.kind,
    };
    Ok(describe(kind))
}

/// Iterate the whole catalog in declaration order.
pub fn entries() -> impl Iterator<Item = &'static RegistryEntry> {
    entry::ENTRIES.iter()
}
