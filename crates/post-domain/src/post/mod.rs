//! Post aggregate and related types.

mod aggregate;
mod events;
mod service;
mod value_objects;

pub use aggregate::Post;
pub use events::{
    CommentAddedData, CommentRemovedData, CommentUpdatedData, MessageUpdatedData,
    PostCreatedData, PostDeletedData, PostEvent, PostLikedData,
};
pub use service::PostService;
pub use value_objects::{Comment, CommentId};

use common::AggregateId;
use thiserror::Error;

use crate::error::{AggregateError, DomainError};

/// Errors that can occur during post operations.
///
/// Every variant except [`PostError::Aggregate`] is a business-rule
/// violation: the post is unchanged and no event was raised.
#[derive(Debug, Error)]
pub enum PostError {
    /// The post has already been created.
    #[error("Post {post_id} already exists")]
    AlreadyCreated { post_id: AggregateId },

    /// The post was deleted, or never created.
    #[error("Cannot {action} a post that is not active")]
    NotActive { action: &'static str },

    /// A required text field was empty or whitespace.
    #[error("The value of {field} cannot be null or empty. Please provide a valid {field}!")]
    BlankField { field: &'static str },

    /// No comment with this id exists on the post.
    #[error("The comment with id {comment_id} does not exist")]
    CommentNotFound { comment_id: CommentId },

    /// Only the commenter may edit or remove a comment.
    #[error("The user {username} is not the author of the comment with id {comment_id}")]
    NotCommentAuthor {
        username: String,
        comment_id: CommentId,
    },

    /// Only the post's author may delete it.
    #[error("The user {username} is not the author of the post with id {post_id}")]
    NotPostAuthor {
        username: String,
        post_id: AggregateId,
    },

    /// The aggregate machinery rejected the raised event.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl PostError {
    /// Name of the input field that violated the rule.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            PostError::AlreadyCreated { .. } => Some("id"),
            PostError::NotActive { .. } => Some("active"),
            PostError::BlankField { field } => Some(*field),
            PostError::CommentNotFound { .. } => Some("comment_id"),
            PostError::NotCommentAuthor { .. } | PostError::NotPostAuthor { .. } => {
                Some("username")
            }
            PostError::Aggregate(_) => None,
        }
    }

    /// Returns true for business-rule violations.
    pub fn is_invariant_violation(&self) -> bool {
        !matches!(self, PostError::Aggregate(_))
    }
}

impl From<PostError> for DomainError {
    fn from(e: PostError) -> Self {
        match e {
            PostError::Aggregate(inner) => DomainError::Aggregate(inner),
            other => DomainError::Post(other),
        }
    }
}
