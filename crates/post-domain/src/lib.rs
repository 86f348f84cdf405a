//! Domain layer for the event-sourced post system.
//!
//! This crate provides:
//! - `AggregateRoot` and the `Aggregate` trait for raising and replaying events
//! - `CommandHandler` for loading, executing and committing against a store
//! - The `Post` aggregate with its comments and the `PostService` facade

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod post;

pub use aggregate::{Aggregate, AggregateRoot, DomainEvent};
pub use clock::{Clock, FixedClock, SystemClock};
pub use command::{CommandHandler, CommandResult};
pub use config::HandlerConfig;
pub use error::{AggregateError, DomainError};
pub use post::{
    Comment, CommentAddedData, CommentId, CommentRemovedData, CommentUpdatedData,
    MessageUpdatedData, Post, PostCreatedData, PostDeletedData, PostError, PostEvent,
    PostLikedData, PostService,
};
