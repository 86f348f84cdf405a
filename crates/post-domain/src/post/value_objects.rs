//! Value objects for the post aggregate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a comment, unique across all posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(Uuid);

impl CommentId {
    /// Generates a new random comment ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CommentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CommentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CommentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A comment as currently held by a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment body.
    pub text: String,

    /// Username of the commenter. Only this user may edit or remove it.
    pub author: String,
}

impl Comment {
    pub fn new(text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: author.into(),
        }
    }

    /// Returns true if `username` wrote this comment.
    ///
    /// Comment authorship is compared exactly.
    pub fn is_written_by(&self, username: &str) -> bool {
        self.author == username
    }
}
