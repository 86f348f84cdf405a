//! Post domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::CommentId;

/// Events that can occur on a post aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PostEvent {
    /// Post was published.
    PostCreated(PostCreatedData),

    /// Post body was replaced.
    MessageUpdated(MessageUpdatedData),

    /// Someone liked the post.
    PostLiked(PostLikedData),

    /// A comment was added.
    CommentAdded(CommentAddedData),

    /// A comment was edited by its author.
    CommentUpdated(CommentUpdatedData),

    /// A comment was removed by its author.
    CommentRemoved(CommentRemovedData),

    /// Post was deleted by its author.
    PostDeleted(PostDeletedData),
}

impl PostEvent {
    /// Every event type the post aggregate knows how to apply.
    pub const EVENT_TYPES: &'static [&'static str] = &[
        "PostCreated",
        "MessageUpdated",
        "PostLiked",
        "CommentAdded",
        "CommentUpdated",
        "CommentRemoved",
        "PostDeleted",
    ];
}

impl DomainEvent for PostEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PostEvent::PostCreated(_) => "PostCreated",
            PostEvent::MessageUpdated(_) => "MessageUpdated",
            PostEvent::PostLiked(_) => "PostLiked",
            PostEvent::CommentAdded(_) => "CommentAdded",
            PostEvent::CommentUpdated(_) => "CommentUpdated",
            PostEvent::CommentRemoved(_) => "CommentRemoved",
            PostEvent::PostDeleted(_) => "PostDeleted",
        }
    }

    fn aggregate_id(&self) -> AggregateId {
        match self {
            PostEvent::PostCreated(data) => data.id,
            PostEvent::MessageUpdated(data) => data.id,
            PostEvent::PostLiked(data) => data.id,
            PostEvent::CommentAdded(data) => data.id,
            PostEvent::CommentUpdated(data) => data.id,
            PostEvent::CommentRemoved(data) => data.id,
            PostEvent::PostDeleted(data) => data.id,
        }
    }
}

/// Data for PostCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCreatedData {
    /// The post ID.
    pub id: AggregateId,

    /// Username of the author.
    pub author: String,

    /// Initial body of the post.
    pub message: String,

    /// When the post was published.
    pub date_posted: DateTime<Utc>,
}

/// Data for MessageUpdated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageUpdatedData {
    pub id: AggregateId,

    /// The new body.
    pub message: String,
}

/// Data for PostLiked event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostLikedData {
    pub id: AggregateId,
}

/// Data for CommentAdded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAddedData {
    pub id: AggregateId,

    /// Identifier generated for the new comment.
    pub comment_id: CommentId,

    /// Comment body.
    pub comment: String,

    /// Username of the commenter.
    pub username: String,
}

/// Data for CommentUpdated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentUpdatedData {
    pub id: AggregateId,
    pub comment_id: CommentId,
    pub comment: String,
    pub username: String,

    /// When the comment was edited.
    pub edit_date: DateTime<Utc>,
}

/// Data for CommentRemoved event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRemovedData {
    pub id: AggregateId,
    pub comment_id: CommentId,
}

/// Data for PostDeleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDeletedData {
    pub id: AggregateId,
}

// Convenience constructors for events
impl PostEvent {
    pub fn post_created(
        id: AggregateId,
        author: impl Into<String>,
        message: impl Into<String>,
        date_posted: DateTime<Utc>,
    ) -> Self {
        PostEvent::PostCreated(PostCreatedData {
            id,
            author: author.into(),
            message: message.into(),
            date_posted,
        })
    }

    pub fn message_updated(id: AggregateId, message: impl Into<String>) -> Self {
        PostEvent::MessageUpdated(MessageUpdatedData {
            id,
            message: message.into(),
        })
    }

    pub fn post_liked(id: AggregateId) -> Self {
        PostEvent::PostLiked(PostLikedData { id })
    }

    pub fn comment_added(
        id: AggregateId,
        comment_id: CommentId,
        comment: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        PostEvent::CommentAdded(CommentAddedData {
            id,
            comment_id,
            comment: comment.into(),
            username: username.into(),
        })
    }

    pub fn comment_updated(
        id: AggregateId,
        comment_id: CommentId,
        comment: impl Into<String>,
        username: impl Into<String>,
        edit_date: DateTime<Utc>,
    ) -> Self {
        PostEvent::CommentUpdated(CommentUpdatedData {
            id,
            comment_id,
            comment: comment.into(),
            username: username.into(),
            edit_date,
        })
    }

    pub fn comment_removed(id: AggregateId, comment_id: CommentId) -> Self {
        PostEvent::CommentRemoved(CommentRemovedData { id, comment_id })
    }

    pub fn post_deleted(id: AggregateId) -> Self {
        PostEvent::PostDeleted(PostDeletedData { id })
    }
}
