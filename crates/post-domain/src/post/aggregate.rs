//! Post aggregate implementation.

use std::collections::HashMap;

use common::AggregateId;

use crate::aggregate::{Aggregate, AggregateRoot, RaiseEvent};
use crate::clock::Clock;

use super::{
    Comment, CommentId, PostError, PostEvent,
    events::{CommentAddedData, CommentUpdatedData, PostCreatedData},
};

/// Post aggregate root.
///
/// A post is active from creation until its author deletes it. Comments
/// are keyed by their own id and stay addressable until removed. The post
/// body and like count are carried by events but not held here; read models
/// own them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Post {
    root: AggregateRoot<PostEvent>,

    /// Username of the author.
    author: String,

    /// False before creation and after deletion.
    active: bool,

    /// Current comments, keyed by comment ID.
    comments: HashMap<CommentId, Comment>,
}

impl Aggregate for Post {
    type Event = PostEvent;
    type Error = PostError;

    fn aggregate_type() -> &'static str {
        "Post"
    }

    fn handled_event_types() -> &'static [&'static str] {
        PostEvent::EVENT_TYPES
    }

    fn root(&self) -> &AggregateRoot<PostEvent> {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot<PostEvent> {
        &mut self.root
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PostEvent::PostCreated(data) => self.apply_post_created(data),
            PostEvent::MessageUpdated(_) | PostEvent::PostLiked(_) => {}
            PostEvent::CommentAdded(data) => self.apply_comment_added(data),
            PostEvent::CommentUpdated(data) => self.apply_comment_updated(data),
            PostEvent::CommentRemoved(data) => {
                self.comments.remove(&data.comment_id);
            }
            PostEvent::PostDeleted(_) => {
                self.active = false;
            }
        }
    }
}

// Query methods
impl Post {
    /// Returns the author's username.
    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns all comments, in no particular order.
    pub fn comments(&self) -> impl Iterator<Item = (&CommentId, &Comment)> {
        self.comments.iter()
    }

    pub fn comment(&self, comment_id: &CommentId) -> Option<&Comment> {
        self.comments.get(comment_id)
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }
}

// Command methods (raise events)
impl Post {
    /// Creates and publishes a new post.
    pub fn new(
        post_id: AggregateId,
        author: impl Into<String>,
        message: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<Self, PostError> {
        let mut post = Self::default();
        post.create(post_id, author, message, clock)?;
        Ok(post)
    }

    /// Publishes this post. Fails if it already has an identity.
    pub fn create(
        &mut self,
        post_id: AggregateId,
        author: impl Into<String>,
        message: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), PostError> {
        if let Some(existing) = self.id() {
            return Err(PostError::AlreadyCreated { post_id: existing });
        }

        self.raise_event(PostEvent::post_created(
            post_id,
            author,
            message,
            clock.now(),
        ))?;
        Ok(())
    }

    /// Replaces the post body.
    pub fn edit_message(&mut self, message: impl Into<String>) -> Result<(), PostError> {
        let post_id = self.active_id("edit")?;
        let message = message.into();
        ensure_not_blank(&message, "message")?;

        self.raise_event(PostEvent::message_updated(post_id, message))?;
        Ok(())
    }

    pub fn like_post(&mut self) -> Result<(), PostError> {
        let post_id = self.active_id("like")?;

        self.raise_event(PostEvent::post_liked(post_id))?;
        Ok(())
    }

    /// Adds a comment and returns the id generated for it.
    pub fn add_comment(
        &mut self,
        comment: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<CommentId, PostError> {
        let post_id = self.active_id("comment on")?;
        let comment = comment.into();
        let username = username.into();
        ensure_not_blank(&comment, "comment")?;
        ensure_not_blank(&username, "username")?;

        let comment_id = CommentId::new();
        self.raise_event(PostEvent::comment_added(
            post_id, comment_id, comment, username,
        ))?;
        Ok(comment_id)
    }

    /// Replaces the text of a comment. Only the commenter may edit it.
    pub fn edit_comment(
        &mut self,
        comment_id: CommentId,
        comment: impl Into<String>,
        username: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), PostError> {
        let post_id = self.active_id("edit a comment on")?;
        let comment = comment.into();
        let username = username.into();
        ensure_not_blank(&comment, "comment")?;
        ensure_not_blank(&username, "username")?;
        self.ensure_comment_author(comment_id, &username)?;

        self.raise_event(PostEvent::comment_updated(
            post_id,
            comment_id,
            comment,
            username,
            clock.now(),
        ))?;
        Ok(())
    }

    /// Removes a comment. Only the commenter may remove it.
    pub fn remove_comment(
        &mut self,
        comment_id: CommentId,
        username: impl Into<String>,
    ) -> Result<(), PostError> {
        let post_id = self.active_id("remove a comment on")?;
        let username = username.into();
        ensure_not_blank(&username, "username")?;
        self.ensure_comment_author(comment_id, &username)?;

        self.raise_event(PostEvent::comment_removed(post_id, comment_id))?;
        Ok(())
    }

    /// Deletes the post. Only its author may do so; usernames are compared
    /// case-insensitively.
    pub fn delete_post(&mut self, username: impl Into<String>) -> Result<(), PostError> {
        let post_id = self.active_id("delete")?;
        let username = username.into();
        if self.author.to_lowercase() != username.to_lowercase() {
            return Err(PostError::NotPostAuthor { username, post_id });
        }

        self.raise_event(PostEvent::post_deleted(post_id))?;
        Ok(())
    }

    fn active_id(&self, action: &'static str) -> Result<AggregateId, PostError> {
        match self.id() {
            Some(post_id) if self.active => Ok(post_id),
            _ => Err(PostError::NotActive { action }),
        }
    }

    fn ensure_comment_author(
        &self,
        comment_id: CommentId,
        username: &str,
    ) -> Result<(), PostError> {
        let comment = self
            .comments
            .get(&comment_id)
            .ok_or(PostError::CommentNotFound { comment_id })?;

        if !comment.is_written_by(username) {
            return Err(PostError::NotCommentAuthor {
                username: username.to_string(),
                comment_id,
            });
        }
        Ok(())
    }
}

fn ensure_not_blank(value: &str, field: &'static str) -> Result<(), PostError> {
    if value.trim().is_empty() {
        return Err(PostError::BlankField { field });
    }
    Ok(())
}

// Apply event helpers
impl Post {
    fn apply_post_created(&mut self, data: &PostCreatedData) {
        self.author = data.author.clone();
        self.active = true;
    }

    fn apply_comment_added(&mut self, data: &CommentAddedData) {
        self.comments.insert(
            data.comment_id,
            Comment::new(data.comment.clone(), data.username.clone()),
        );
    }

    fn apply_comment_updated(&mut self, data: &CommentUpdatedData) {
        self.comments.insert(
            data.comment_id,
            Comment::new(data.comment.clone(), data.username.clone()),
        );
    }
}
