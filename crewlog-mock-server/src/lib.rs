use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use chrono::Utc;
use crewlog_client::{
    api::{
        self, AuthToken, Comment, CommentId, DeleteComment, EditComment, Error, NewComment,
        NewPost, NewUser, Post, PostId, Time, User, UserId, Uuid,
    },
    ChangeFeed, Changed, CommentService, Subscription,
};
use futures::{channel::mpsc, StreamExt};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// In-memory persistence and change feed, with the same rules as the real server
#[derive(Debug, Default)]
pub struct MockServer {
    users: BTreeMap<UserId, User>,
    sessions: HashMap<AuthToken, UserId>,
    posts: HashMap<PostId, Post>,

    // In creation order
    comments: Vec<Comment>,

    feeds: HashMap<PostId, Vec<mpsc::UnboundedSender<Changed>>>,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    /// Make `comment` look like it was posted `age` earlier than it was
    pub fn test_backdate_comment(&mut self, comment: CommentId, age: chrono::Duration) {
        let c = self
            .comments
            .iter_mut()
            .find(|c| c.id == comment)
            .unwrap_or_else(|| panic!("backdating unknown comment {comment:?}"));
        c.created_at = c.created_at - age;
        c.updated_at = c.updated_at - age;
    }

    /// Number of change feed subscriptions to `post` that are still alive
    pub fn test_num_feeds(&self, post: PostId) -> usize {
        self.feeds
            .get(&post)
            .map(|f| f.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }

    pub fn test_num_comments(&self) -> usize {
        self.comments.len()
    }

    pub fn test_last_comment_id(&self) -> Option<CommentId> {
        self.comments.last().map(|c| c.id)
    }

    pub fn test_get_comment(&self, comment: CommentId) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment)
    }

    pub fn admin_create_user(&mut self, u: NewUser) -> Result<AuthToken, Error> {
        u.validate()?;
        if self.users.contains_key(&u.id) {
            return Err(Error::UuidAlreadyUsed(u.id.0));
        }
        let token = AuthToken(Uuid::new_v4());
        self.sessions.insert(token, u.id);
        self.users.insert(u.id, u.into_user());
        Ok(token)
    }

    pub fn admin_create_post(&mut self, p: NewPost) -> Result<(), Error> {
        p.validate()?;
        if !self.users.contains_key(&p.author_id) {
            return Err(Error::NotFound);
        }
        if self.posts.contains_key(&p.id) {
            return Err(Error::UuidAlreadyUsed(p.id.0));
        }
        self.posts.insert(p.id, p.into_post());
        Ok(())
    }

    fn resolve(&self, tok: AuthToken) -> Result<&User, Error> {
        self.sessions
            .get(&tok)
            .and_then(|id| self.users.get(id))
            .ok_or(Error::PermissionDenied)
    }

    pub fn whoami(&self, tok: AuthToken) -> Result<User, Error> {
        self.resolve(tok).cloned()
    }

    fn comment_in(&self, post: PostId, comment: CommentId) -> Result<&Comment, Error> {
        self.comments
            .iter()
            .find(|c| c.id == comment && c.post_id == post)
            .ok_or(Error::NotFound)
    }

    fn relay_change(&mut self, post: PostId) {
        if let Some(feeds) = self.feeds.get_mut(&post) {
            feeds.retain(|f| f.unbounded_send(Changed).is_ok());
        }
    }

    pub fn list_comments(&self, tok: AuthToken, post: PostId) -> Result<Vec<Comment>, Error> {
        let viewer = self.resolve(tok)?.actor();
        let post = self.posts.get(&post).ok_or(Error::NotFound)?;
        Ok(self
            .comments
            .iter()
            .filter(|c| c.post_id == post.id)
            .map(|c| {
                let mut c = c.clone();
                c.redact_for(post, &viewer);
                c
            })
            .collect())
    }

    pub fn add_comment(
        &mut self,
        tok: AuthToken,
        post: PostId,
        c: NewComment,
        now: Time,
    ) -> Result<CommentId, Error> {
        let author = self.resolve(tok)?.clone();
        let content = String::from(c.validate()?);
        if !self.posts.contains_key(&post) {
            return Err(Error::NotFound);
        }
        if let Some(parent) = c.parent_comment_id {
            if self.comment_in(post, parent).is_err() {
                return Err(Error::InvalidParent(parent));
            }
        }
        let id = CommentId(Uuid::new_v4());
        self.comments.push(Comment::new(
            id,
            post,
            c.parent_comment_id,
            &author,
            content,
            now,
        ));
        self.relay_change(post);
        Ok(id)
    }

    pub fn edit_comment(
        &mut self,
        tok: AuthToken,
        post: PostId,
        e: EditComment,
        now: Time,
    ) -> Result<(), Error> {
        let actor = self.resolve(tok)?.actor();
        let content = String::from(e.validate()?);
        let c = self.comment_in(post, e.comment_id)?;
        if !c.is_own(&actor) {
            return Err(Error::PermissionDenied);
        }
        if !api::within_edit_window(c.created_at, now) {
            return Err(Error::EditWindowExpired);
        }
        for c in self.comments.iter_mut().filter(|c| c.id == e.comment_id) {
            c.content = content.clone();
            c.updated_at = now;
        }
        self.relay_change(post);
        Ok(())
    }

    /// Removes the comment along with all its replies
    pub fn delete_comment(
        &mut self,
        tok: AuthToken,
        post: PostId,
        d: DeleteComment,
        now: Time,
    ) -> Result<(), Error> {
        let actor = self.resolve(tok)?.actor();
        let c = self.comment_in(post, d.comment_id)?;
        if !actor.is_admin() {
            if !c.is_own(&actor) {
                return Err(Error::PermissionDenied);
            }
            if !api::within_edit_window(c.created_at, now) {
                return Err(Error::EditWindowExpired);
            }
        }
        self.remove_subtree(d.comment_id);
        self.relay_change(post);
        Ok(())
    }

    fn remove_subtree(&mut self, root: CommentId) -> usize {
        let mut doomed = HashSet::from([root]);
        // comments come after their parents, so a single pass finds all descendants
        for c in self.comments.iter() {
            if matches!(c.parent_comment_id, Some(p) if doomed.contains(&p)) {
                doomed.insert(c.id);
            }
        }
        let before = self.comments.len();
        self.comments.retain(|c| !doomed.contains(&c.id));
        before - self.comments.len()
    }

    pub fn subscribe(
        &mut self,
        tok: AuthToken,
        post: PostId,
    ) -> Result<mpsc::UnboundedReceiver<Changed>, Error> {
        self.resolve(tok)?;
        if !self.posts.contains_key(&post) {
            return Err(Error::NotFound);
        }
        let (sender, receiver) = mpsc::unbounded();
        self.feeds.entry(post).or_default().push(sender);
        Ok(receiver)
    }
}

/// Mock server shared between the code under test and the test itself
#[derive(Clone, Debug, Default)]
pub struct SharedMock(Arc<Mutex<MockServer>>);

impl SharedMock {
    pub fn new(mock: MockServer) -> SharedMock {
        SharedMock(Arc::new(Mutex::new(mock)))
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, MockServer> {
        self.0.lock().await
    }

    /// Exclusive access through the persistence trait the server is written against
    pub async fn db(&self) -> MockDb {
        MockDb(self.0.clone().lock_owned().await)
    }

    /// Client-side view of the mock, acting with the session `token`
    pub fn session(&self, token: AuthToken) -> MockSession {
        MockSession {
            mock: self.clone(),
            token,
        }
    }
}

pub struct MockDb(OwnedMutexGuard<MockServer>);

#[async_trait::async_trait]
impl api::Db for MockDb {
    async fn recover_session(&mut self, token: AuthToken) -> anyhow::Result<Option<User>> {
        Ok(self.0.resolve(token).ok().cloned())
    }

    async fn get_user(&mut self, user: UserId) -> anyhow::Result<Option<User>> {
        Ok(self.0.users.get(&user).cloned())
    }

    async fn create_user(&mut self, user: &User, token: AuthToken) -> anyhow::Result<bool> {
        if self.0.users.contains_key(&user.id) {
            return Ok(false);
        }
        self.0.users.insert(user.id, user.clone());
        self.0.sessions.insert(token, user.id);
        Ok(true)
    }

    async fn create_post(&mut self, post: &Post) -> anyhow::Result<bool> {
        if self.0.posts.contains_key(&post.id) {
            return Ok(false);
        }
        self.0.posts.insert(post.id, post.clone());
        Ok(true)
    }

    async fn get_post(&mut self, post: PostId) -> anyhow::Result<Option<Post>> {
        Ok(self.0.posts.get(&post).cloned())
    }

    async fn get_comment(&mut self, comment: CommentId) -> anyhow::Result<Option<Comment>> {
        Ok(self.0.test_get_comment(comment).cloned())
    }

    async fn list_comments(&mut self, post: PostId) -> anyhow::Result<Vec<Comment>> {
        Ok(self
            .0
            .comments
            .iter()
            .filter(|c| c.post_id == post)
            .cloned()
            .collect())
    }

    async fn insert_comment(&mut self, comment: &Comment) -> anyhow::Result<()> {
        if self.0.test_get_comment(comment.id).is_some() {
            anyhow::bail!("comment {:?} already exists", comment.id);
        }
        self.0.comments.push(comment.clone());
        Ok(())
    }

    async fn update_comment(
        &mut self,
        comment: CommentId,
        content: &str,
        now: Time,
    ) -> anyhow::Result<bool> {
        let mut found = false;
        for c in self.0.comments.iter_mut().filter(|c| c.id == comment) {
            c.content = String::from(content);
            c.updated_at = now;
            found = true;
        }
        Ok(found)
    }

    async fn delete_comment(&mut self, comment: CommentId) -> anyhow::Result<usize> {
        Ok(self.0.remove_subtree(comment))
    }
}

/// One client session against the mock server
#[derive(Clone, Debug)]
pub struct MockSession {
    mock: SharedMock,
    token: AuthToken,
}

impl MockSession {
    pub fn token(&self) -> AuthToken {
        self.token
    }
}

#[async_trait::async_trait]
impl CommentService for MockSession {
    async fn list_comments(&self, post: PostId) -> Result<Vec<Comment>, crewlog_client::Error> {
        Ok(self.mock.lock().await.list_comments(self.token, post)?)
    }

    async fn add_comment(
        &self,
        post: PostId,
        comment: NewComment,
    ) -> Result<(), crewlog_client::Error> {
        self.mock
            .lock()
            .await
            .add_comment(self.token, post, comment, Utc::now())?;
        Ok(())
    }

    async fn edit_comment(&self, post: PostId, edit: EditComment) -> Result<(), crewlog_client::Error> {
        Ok(self
            .mock
            .lock()
            .await
            .edit_comment(self.token, post, edit, Utc::now())?)
    }

    async fn delete_comment(
        &self,
        post: PostId,
        delete: DeleteComment,
    ) -> Result<(), crewlog_client::Error> {
        Ok(self
            .mock
            .lock()
            .await
            .delete_comment(self.token, post, delete, Utc::now())?)
    }
}

#[async_trait::async_trait]
impl ChangeFeed for MockSession {
    async fn subscribe(&self, post: PostId) -> Result<Subscription, crewlog_client::Error> {
        let receiver = self.mock.lock().await.subscribe(self.token, post)?;
        Ok(Subscription::new(receiver.boxed()))
    }
}
