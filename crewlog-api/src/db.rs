use async_trait::async_trait;

use crate::{AuthToken, Comment, CommentId, Post, PostId, Time, User, UserId};

/// Persistence operations behind the comment endpoints.
///
/// Implemented by the postgres backend of the server and by the mock server.
#[async_trait]
pub trait Db: Send {
    async fn recover_session(&mut self, token: AuthToken) -> anyhow::Result<Option<User>>;
    async fn get_user(&mut self, user: UserId) -> anyhow::Result<Option<User>>;

    /// Returns false without creating anything if the user id is already taken
    async fn create_user(&mut self, user: &User, token: AuthToken) -> anyhow::Result<bool>;

    /// Returns false without creating anything if the post id is already taken
    async fn create_post(&mut self, post: &Post) -> anyhow::Result<bool>;
    async fn get_post(&mut self, post: PostId) -> anyhow::Result<Option<Post>>;
    async fn get_comment(&mut self, comment: CommentId) -> anyhow::Result<Option<Comment>>;

    /// Flat list, oldest first
    async fn list_comments(&mut self, post: PostId) -> anyhow::Result<Vec<Comment>>;

    async fn insert_comment(&mut self, comment: &Comment) -> anyhow::Result<()>;

    /// Returns false if the comment does not exist (anymore)
    async fn update_comment(
        &mut self,
        comment: CommentId,
        content: &str,
        now: Time,
    ) -> anyhow::Result<bool>;

    /// Deletes the comment and all its replies, returning the number of removed comments
    async fn delete_comment(&mut self, comment: CommentId) -> anyhow::Result<usize>;
}
