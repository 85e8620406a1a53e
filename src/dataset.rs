//! Documents and principals to load into a retriever.
//!
//! A dataset file is TOML (or JSON, chosen by the `.json` extension):
//!
//! ```toml
//! [[documents]]
//! id = "doc2"
//! title = "API仕様書"
//! body = "APIの認証・エラー・レート制限"
//! owner = "bob"
//! group = "eng"
//! permissions = { owner = true, group = true, other = false }
//!
//! [[principals]]
//! id = "alice"
//! groups = ["eng"]
//! ```
//!
//! Without a file, [`Dataset::sample`] provides five documents and five
//! principals covering every permission class.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use acl_rag_core::models::{Document, Permissions, Principal};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub principals: Vec<Principal>,
}

impl Dataset {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset file: {}", path.display()))?;

        let dataset: Dataset = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse dataset file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse dataset file: {}", path.display()))?,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Load `path` if given, otherwise return [`Dataset::sample`].
    pub fn load_or_sample(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::sample()),
        }
    }

    /// Reject duplicate document or principal ids before ingestion starts.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for doc in &self.documents {
            if doc.id.trim().is_empty() {
                bail!("Dataset contains a document with an empty id");
            }
            if !seen.insert(doc.id.as_str()) {
                bail!("Duplicate document id in dataset: {}", doc.id);
            }
        }

        let mut seen = HashSet::new();
        for principal in &self.principals {
            if !seen.insert(principal.id.as_str()) {
                bail!("Duplicate principal id in dataset: {}", principal.id);
            }
        }
        Ok(())
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn principal(&self, id: &str) -> Option<&Principal> {
        self.principals.iter().find(|p| p.id == id)
    }

    /// Resolve the principal a search runs as.
    ///
    /// Explicit `groups` override the dataset entry and also allow ad-hoc
    /// users the dataset doesn't list. An unknown user without groups is an
    /// error rather than a silent "no groups" principal.
    pub fn resolve_principal(&self, user: &str, groups: &[String]) -> Result<Principal> {
        if !groups.is_empty() {
            return Ok(Principal::new(user, groups.iter().cloned()));
        }
        match self.principal(user) {
            Some(p) => Ok(p.clone()),
            None => bail!(
                "Unknown user '{}'. Add it to the dataset or pass --group.",
                user
            ),
        }
    }

    pub fn sample() -> Self {
        let documents = vec![
            Document::new(
                "doc1",
                "プロジェクト設計書",
                "これは秘密の設計書です",
                "alice",
                "eng",
                Permissions::new(true, false, false),
            ),
            Document::new(
                "doc2",
                "API仕様書",
                "APIの認証・エラー・レート制限",
                "bob",
                "eng",
                Permissions::new(true, true, false),
            ),
            Document::new(
                "doc3",
                "マーケ戦略",
                "Q2の施策まとめ",
                "charlie",
                "mkt",
                Permissions::new(true, true, false),
            ),
            Document::new(
                "doc4",
                "リモートワークガイド",
                "全社員向けポリシー",
                "admin",
                "all",
                Permissions::new(true, true, true),
            ),
            Document::new(
                "doc5",
                "技術スタック標準化",
                "Python/React/PostgreSQL",
                "alice",
                "eng",
                Permissions::new(true, true, false),
            ),
        ];

        let principals = vec![
            Principal::new("alice", ["eng"]),
            Principal::new("bob", ["eng"]),
            Principal::new("charlie", ["mkt"]),
            Principal::new("david", ["sales"]),
            Principal::new("guest", Vec::<String>::new()),
        ];

        Self {
            documents,
            principals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sample_is_valid() {
        let sample = Dataset::sample();
        sample.validate().unwrap();
        assert_eq!(sample.documents.len(), 5);
        assert_eq!(sample.principals.len(), 5);
        assert_eq!(sample.document("doc2").unwrap().permissions.summary(), "rr-");
    }

    #[test]
    fn test_load_toml_with_partial_permissions() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.toml");
        std::fs::write(
            &path,
            r#"
[[documents]]
id = "a"
title = "A"
body = "alpha"
owner = "u1"
group = "g1"
permissions = { owner = true }

[[principals]]
id = "u1"
groups = ["g1", "g2"]
"#,
        )
        .unwrap();

        let dataset = Dataset::load(&path).unwrap();
        assert_eq!(dataset.documents[0].permissions, Permissions::private());
        assert!(dataset.principals[0].is_member_of("g2"));
    }

    #[test]
    fn test_load_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(
            &path,
            r#"{"documents":[{"id":"a","title":"A","body":"","owner":"u","group":"g",
               "permissions":{"owner":true,"group":true,"other":true}}]}"#,
        )
        .unwrap();

        let dataset = Dataset::load(&path).unwrap();
        assert_eq!(dataset.documents[0].permissions, Permissions::public());
        assert!(dataset.principals.is_empty());
    }

    #[test]
    fn test_duplicate_document_ids_rejected() {
        let mut dataset = Dataset::sample();
        dataset.documents.push(dataset.documents[0].clone());
        assert!(dataset.validate().is_err());
    }

    #[test]
    fn test_resolve_principal() {
        let dataset = Dataset::sample();
        assert!(dataset.resolve_principal("alice", &[]).unwrap().is_member_of("eng"));
        assert!(dataset.resolve_principal("mallory", &[]).is_err());

        let adhoc = dataset
            .resolve_principal("mallory", &["mkt".to_string()])
            .unwrap();
        assert!(adhoc.is_member_of("mkt"));

        let overridden = dataset
            .resolve_principal("alice", &["sales".to_string()])
            .unwrap();
        assert!(!overridden.is_member_of("eng"));
    }
}
