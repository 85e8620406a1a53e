//! Core data models: principals, documents, permission triples, and
//! search hits.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The identity a search runs on behalf of, with its group memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl Principal {
    pub fn new<I, S>(id: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

/// The three audience classes a document grants read access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionClass {
    Owner,
    Group,
    Other,
}

impl PermissionClass {
    pub const ALL: [PermissionClass; 3] = [Self::Owner, Self::Group, Self::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Group => "group",
            Self::Other => "other",
        }
    }
}

/// Owner/group/other read bits of a document.
///
/// Missing keys deserialize as `false`, so `{ owner = true }` is a
/// private document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub owner: bool,
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub other: bool,
}

impl Permissions {
    pub const fn new(owner: bool, group: bool, other: bool) -> Self {
        Self {
            owner,
            group,
            other,
        }
    }

    /// Readable by the owner only.
    pub const fn private() -> Self {
        Self::new(true, false, false)
    }

    /// Readable by everyone.
    pub const fn public() -> Self {
        Self::new(true, true, true)
    }

    /// The read bit for one audience class.
    pub fn allows(&self, class: PermissionClass) -> bool {
        match class {
            PermissionClass::Owner => self.owner,
            PermissionClass::Group => self.group,
            PermissionClass::Other => self.other,
        }
    }

    /// Three-character summary in owner/group/other order, `r` for a set
    /// bit and `-` otherwise (e.g. `rr-`).
    pub fn summary(&self) -> String {
        PermissionClass::ALL
            .iter()
            .map(|class| if self.allows(*class) { 'r' } else { '-' })
            .collect()
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// A unit of retrievable content with ownership and a permission triple.
///
/// `id` is the join key between the document store and the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub body: String,
    pub owner: String,
    pub group: String,
    #[serde(default)]
    pub permissions: Permissions,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        owner: impl Into<String>,
        group: impl Into<String>,
        permissions: Permissions,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            owner: owner.into(),
            group: group.into(),
            permissions,
        }
    }

    /// Text that gets embedded and stored alongside the vector.
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.title, self.body)
    }
}

/// One accessible result of a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub title: String,
    pub content: String,
    /// `1 - distance` as reported by the vector index.
    pub similarity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_summary() {
        assert_eq!(Permissions::new(true, false, false).summary(), "r--");
        assert_eq!(Permissions::new(true, true, false).summary(), "rr-");
        assert_eq!(Permissions::public().summary(), "rrr");
        assert_eq!(Permissions::default().summary(), "---");
        assert_eq!(Permissions::new(false, true, true).to_string(), "-rr");
    }

    #[test]
    fn test_allows_maps_each_class() {
        let perms = Permissions::new(false, true, false);
        assert!(!perms.allows(PermissionClass::Owner));
        assert!(perms.allows(PermissionClass::Group));
        assert!(!perms.allows(PermissionClass::Other));
    }

    #[test]
    fn test_embedding_text_joins_title_and_body() {
        let doc = Document::new("d1", "Title", "Body text", "alice", "eng", Permissions::private());
        assert_eq!(doc.embedding_text(), "Title\nBody text");
    }

    #[test]
    fn test_permissions_missing_keys_default_false() {
        let perms: Permissions = serde_json::from_str(r#"{"owner": true}"#).unwrap();
        assert_eq!(perms, Permissions::private());
    }

    #[test]
    fn test_principal_membership() {
        let p = Principal::new("alice", ["eng", "ops"]);
        assert!(p.is_member_of("eng"));
        assert!(!p.is_member_of("mkt"));
        let guest = Principal::new("guest", Vec::<String>::new());
        assert!(guest.groups.is_empty());
    }
}
