use serde::Serialize;

use crate::registry::kind::OperationKind;

/// Whether an operation targets one job or the whole collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Single,
    Collection,
}

/// The part of a job an operation is allowed to mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Lifecycle,
    Bookmark,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub kind: OperationKind,
    pub scope: Scope,
    pub idempotent: bool,
    pub facet: Facet,
}

impl RegistryEntry {
    const fn new(kind: OperationKind, scope: Scope, idempotent: bool, facet: Facet) -> Self {
        Self {
            kind,
            scope,
            idempotent,
            facet,
        }
    }

    /// Whether this operation must not run on a job while `other` is pending
    /// on the same job.
    ///
    /// Kinds sharing a facet other than `None` serialize. `Delete` excludes
    /// everything on its job. Collection-scoped kinds never conflict.
    pub fn conflicts_with(&self, other: &RegistryEntry) -> bool {
        if self.scope == Scope::Collection || other.scope == Scope::Collection {
            return false;
        }
        if self.kind == OperationKind::Delete || other.kind == OperationKind::Delete {
            return true;
        }
        self.facet != Facet::None && self.facet == other.facet
    }
}

pub(crate) static ENTRIES: [RegistryEntry; 11] = [
    RegistryEntry::new(OperationKind::Create, Scope::Single, false, Facet::Lifecycle),
    RegistryEntry::new(OperationKind::Delete, Scope::Single, true, Facet::Lifecycle),
    RegistryEntry::new(OperationKind::Stop, Scope::Single, true, Facet::Lifecycle),
    RegistryEntry::new(OperationKind::Archive, Scope::Single, true, Facet::Lifecycle),
    RegistryEntry::new(OperationKind::Restart, Scope::Single, false, Facet::Lifecycle),
    RegistryEntry::new(OperationKind::Restore, Scope::Single, true, Facet::Lifecycle),
    RegistryEntry::new(OperationKind::Update, Scope::Single, true, Facet::None),
    RegistryEntry::new(OperationKind::Get, Scope::Single, true, Facet::None),
    RegistryEntry::new(OperationKind::FetchAll, Scope::Collection, true, Facet::None),
    RegistryEntry::new(OperationKind::Bookmark, Scope::Single, true, Facet::Bookmark),
    RegistryEntry::new(OperationKind::Unbookmark, Scope::Single, true, Facet::Bookmark),
];
