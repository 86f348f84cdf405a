//! Post service providing a simplified API for post operations.

use common::AggregateId;
use event_store::EventStore;

use crate::clock::{Clock, SystemClock};
use crate::command::{CommandHandler, CommandResult};
use crate::config::HandlerConfig;
use crate::error::DomainError;

use super::{CommentId, Post};

/// Service for managing posts.
///
/// Each call loads the post from the store, runs one business method and
/// persists the resulting event. Timestamps come from the service's clock.
pub struct PostService<S: EventStore, C: Clock = SystemClock> {
    handler: CommandHandler<S, Post>,
    clock: C,
}

impl<S: EventStore> PostService<S> {
    /// Creates a new post service with the given event store.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: EventStore, C: Clock> PostService<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self::with_config(store, clock, HandlerConfig::default())
    }

    pub fn with_config(store: S, clock: C, config: HandlerConfig) -> Self {
        Self {
            handler: CommandHandler::with_config(store, config),
            clock,
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Post> {
        &self.handler
    }

    /// Loads a post, returning None if it was never created.
    pub async fn load(&self, post_id: AggregateId) -> Result<Option<Post>, DomainError> {
        self.handler.load_existing(post_id).await
    }

    /// Publishes a new post.
    #[tracing::instrument(skip(self, message))]
    pub async fn create_post(
        &self,
        post_id: AggregateId,
        author: &str,
        message: &str,
    ) -> Result<CommandResult<Post>, DomainError> {
        let clock = &self.clock;
        self.handler
            .execute(post_id, |post| post.create(post_id, author, message, clock))
            .await
    }

    #[tracing::instrument(skip(self, message))]
    pub async fn edit_message(
        &self,
        post_id: AggregateId,
        message: &str,
    ) -> Result<CommandResult<Post>, DomainError> {
        self.handler
            .execute_existing(post_id, |post| post.edit_message(message))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn like_post(
        &self,
        post_id: AggregateId,
    ) -> Result<CommandResult<Post>, DomainError> {
        self.handler
            .execute_existing(post_id, |post| post.like_post())
            .await
    }

    /// Adds a comment; the generated comment id is returned as the result's output.
    #[tracing::instrument(skip(self, comment))]
    pub async fn add_comment(
        &self,
        post_id: AggregateId,
        comment: &str,
        username: &str,
    ) -> Result<CommandResult<Post, CommentId>, DomainError> {
        self.handler
            .execute_existing(post_id, |post| post.add_comment(comment, username))
            .await
    }

    #[tracing::instrument(skip(self, comment))]
    pub async fn edit_comment(
        &self,
        post_id: AggregateId,
        comment_id: CommentId,
        comment: &str,
        username: &str,
    ) -> Result<CommandResult<Post>, DomainError> {
        let clock = &self.clock;
        self.handler
            .execute_existing(post_id, |post| {
                post.edit_comment(comment_id, comment, username, clock)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_comment(
        &self,
        post_id: AggregateId,
        comment_id: CommentId,
        username: &str,
    ) -> Result<CommandResult<Post>, DomainError> {
        self.handler
            .execute_existing(post_id, |post| post.remove_comment(comment_id, username))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_post(
        &self,
        post_id: AggregateId,
        username: &str,
    ) -> Result<CommandResult<Post>, DomainError> {
        self.handler
            .execute_existing(post_id, |post| post.delete_post(username))
            .await
    }
}
