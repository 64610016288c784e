use serde::{Deserialize, Serialize};

pub mod drain_state;
pub mod events;

pub use drain_state::DrainState;
pub use events::DeletionEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreTypeError {
    InvalidCollectionPath(String),
}

impl std::fmt::Display for CoreTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreTypeError::InvalidCollectionPath(msg) => {
                write!(f, "Invalid collection path: {}", msg)
            }
        }
    }
}

impl std::error::Error for CoreTypeError {}

/// Slash separated path of a collection, relative to the database root.
///
/// A collection path always has an odd number of segments: `users` is a
/// top level collection, `users/alice/orders` is a subcollection of the
/// document `users/alice`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn parse(path: &str) -> Result<Self, CoreTypeError> {
        let trimmed = path.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(CoreTypeError::InvalidCollectionPath(
                "collection path is empty".to_string(),
            ));
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(CoreTypeError::InvalidCollectionPath(format!(
                "'{}' contains an empty segment",
                path
            )));
        }
        if segments.len() % 2 == 0 {
            return Err(CoreTypeError::InvalidCollectionPath(format!(
                "'{}' points to a document, not a collection",
                path
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Id of the collection itself (the last path segment).
    pub fn collection_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Path of the document owning this collection, `None` for top level collections.
    pub fn parent_document(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(parent, _)| parent)
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CollectionPath {
    type Err = CoreTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Reference to a single document by its resource name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentRef {
    pub name: String,
}

impl DocumentRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_top_level_collection() {
        let path = CollectionPath::parse("users").unwrap();
        assert_eq!(path.as_str(), "users");
        assert_eq!(path.collection_id(), "users");
        assert_eq!(path.parent_document(), None);
    }

    #[test]
    fn test_parse_subcollection() {
        let path = CollectionPath::parse("/users/alice/orders/").unwrap();
        assert_eq!(path.as_str(), "users/alice/orders");
        assert_eq!(path.collection_id(), "orders");
        assert_eq!(path.parent_document(), Some("users/alice"));
    }

    #[test]
    fn test_parse_rejects_invalid_paths() {
        assert!(CollectionPath::parse("").is_err());
        assert!(CollectionPath::parse("  / ").is_err());
        assert!(CollectionPath::parse("users//orders").is_err());
        assert!(matches!(
            CollectionPath::parse("users/alice"),
            Err(CoreTypeError::InvalidCollectionPath(_))
        ));
    }

    #[test]
    fn test_document_ref_id() {
        let doc = DocumentRef::new("projects/p/databases/(default)/documents/users/alice");
        assert_eq!(doc.id(), "alice");
    }

    #[test]
    fn test_document_ref_json_shape() {
        let doc: DocumentRef = serde_json::from_str(r#"{"name":"users/bob"}"#).unwrap();
        assert_eq!(doc, DocumentRef::new("users/bob"));
    }
}
