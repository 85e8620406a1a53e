//! Access policy evaluation.
//!
//! The rule is evaluated in a fixed precedence order, first match wins:
//!
//! 1. The principal owns the document → owner bit.
//! 2. The principal is a member of the document's group → group bit.
//! 3. Anyone else → other bit.
//!
//! Ownership takes precedence over group membership even when the owner
//! also belongs to the document's group. There are no transitive groups
//! and no explicit deny.

use serde::Serialize;

use crate::models::{Document, PermissionClass, Principal};

/// Which audience class governs `principal`'s access to `document`.
pub fn applicable_class(principal: &Principal, document: &Document) -> PermissionClass {
    if principal.id == document.owner {
        PermissionClass::Owner
    } else if principal.is_member_of(&document.group) {
        PermissionClass::Group
    } else {
        PermissionClass::Other
    }
}

/// Whether `principal` may read `document`. Total and side-effect free.
pub fn can_access(principal: &Principal, document: &Document) -> bool {
    document
        .permissions
        .allows(applicable_class(principal, document))
}

/// Principal × document readability grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessMatrix {
    pub principals: Vec<String>,
    pub documents: Vec<String>,
    /// `cells[p][d]` is true when principal `p` can read document `d`.
    pub cells: Vec<Vec<bool>>,
}

impl AccessMatrix {
    pub fn get(&self, principal_id: &str, doc_id: &str) -> Option<bool> {
        let p = self.principals.iter().position(|id| id == principal_id)?;
        let d = self.documents.iter().position(|id| id == doc_id)?;
        Some(self.cells[p][d])
    }

    /// Documents the given principal can read, in column order.
    pub fn readable_by(&self, principal_id: &str) -> Vec<&str> {
        let Some(p) = self.principals.iter().position(|id| id == principal_id) else {
            return Vec::new();
        };
        self.documents
            .iter()
            .zip(&self.cells[p])
            .filter(|(_, allowed)| **allowed)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Evaluate [`can_access`] for every principal/document pair.
pub fn access_matrix(principals: &[Principal], documents: &[Document]) -> AccessMatrix {
    AccessMatrix {
        principals: principals.iter().map(|p| p.id.clone()).collect(),
        documents: documents.iter().map(|d| d.id.clone()).collect(),
        cells: principals
            .iter()
            .map(|p| documents.iter().map(|d| can_access(p, d)).collect())
            .collect(),
    }
}
