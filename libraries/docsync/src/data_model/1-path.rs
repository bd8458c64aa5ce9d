//! # Paths
//! Collections and documents are addressed by slash separated paths, alternating between collection names
//! and document ids. A collection path therefore always has an odd number of segments.
//! Per-user collections are namespaced by application: `artifacts/{application}/users/{user}/{collection}`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path segment must not be empty")]
    EmptySegment,
    #[error("path segment {0:?} must not contain '/'")]
    SlashInSegment(String),
    #[error("a collection path needs an odd number of segments, got {0}")]
    NotACollection(usize),
}

fn check_segment(segment: &str) -> Result<(), PathError> {
    if segment.is_empty() {
        return Err(PathError::EmptySegment);
    }
    if segment.contains('/') {
        return Err(PathError::SlashInSegment(segment.to_string()));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Result<Self, PathError> {
        let id = id.into();
        check_segment(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentId {
    type Error = PathError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl CollectionPath {
    pub const APPLICATION_ROOT: &'static str = "artifacts";
    pub const USERS: &'static str = "users";

    pub fn new<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        for segment in &segments {
            check_segment(segment)?;
        }
        if segments.len() % 2 == 0 {
            return Err(PathError::NotACollection(segments.len()));
        }
        Ok(Self { segments })
    }

    /// `artifacts/{application}/users/{user}/{collection}`
    pub fn user_collection(
        application: &str,
        user: &str,
        collection: &str,
    ) -> Result<Self, PathError> {
        Self::new([
            Self::APPLICATION_ROOT,
            application,
            Self::USERS,
            user,
            collection,
        ])
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn document(&self, id: &DocumentId) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.clone(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: DocumentId,
}

impl DocumentPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_collection_path() {
        let path = CollectionPath::user_collection("app1", "u1", "blog_posts").unwrap();
        assert_eq!(path.to_string(), "artifacts/app1/users/u1/blog_posts");

        let document = path.document(&DocumentId::new("abc").unwrap());
        assert_eq!(
            document.to_string(),
            "artifacts/app1/users/u1/blog_posts/abc"
        );
        assert_eq!(document.collection(), &path);
    }

    #[test]
    fn test_rejects_bad_segments() {
        assert_eq!(
            CollectionPath::user_collection("app1", "", "blog_posts"),
            Err(PathError::EmptySegment)
        );
        assert_eq!(
            CollectionPath::user_collection("app/1", "u1", "blog_posts"),
            Err(PathError::SlashInSegment("app/1".into()))
        );
        assert_eq!(
            CollectionPath::new(["artifacts", "app1"]),
            Err(PathError::NotACollection(2))
        );
        assert!(DocumentId::new("").is_err());
    }
}
