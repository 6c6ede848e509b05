use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{channel::oneshot, stream::BoxStream, Stream};

use crate::{
    api::{Comment, DeleteComment, EditComment, NewComment, PostId},
    Error,
};

/// Persistence service for the comments of feedback posts
#[async_trait::async_trait]
pub trait CommentService: Send + Sync {
    /// Flat list of the post's comments, oldest first
    async fn list_comments(&self, post: PostId) -> Result<Vec<Comment>, Error>;

    async fn add_comment(&self, post: PostId, comment: NewComment) -> Result<(), Error>;
    async fn edit_comment(&self, post: PostId, edit: EditComment) -> Result<(), Error>;
    async fn delete_comment(&self, post: PostId, delete: DeleteComment) -> Result<(), Error>;
}

/// Change feed, notifying that the comments of a post changed in some way
#[async_trait::async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, post: PostId) -> Result<Subscription, Error>;
}

/// Trigger-only notification: whoever receives it is expected to re-fetch
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Changed;

/// Live subscription to the change feed of one post.
///
/// Dropping it releases the underlying connection.
pub struct Subscription {
    events: BoxStream<'static, Changed>,
    _release: Option<oneshot::Sender<()>>,
}

impl Subscription {
    pub fn new(events: BoxStream<'static, Changed>) -> Subscription {
        Subscription {
            events,
            _release: None,
        }
    }

    /// The receiver side resolves as soon as the subscription is dropped
    pub fn with_release(events: BoxStream<'static, Changed>) -> (Subscription, oneshot::Receiver<()>) {
        let (sender, receiver) = oneshot::channel();
        let sub = Subscription {
            events,
            _release: Some(sender),
        };
        (sub, receiver)
    }
}

impl Stream for Subscription {
    type Item = Changed;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Changed>> {
        self.events.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
