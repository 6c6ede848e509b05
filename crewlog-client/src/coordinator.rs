use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    api::{Actor, Comment, CommentId, DeleteComment, EditComment, NewComment, PostId, Time},
    assemble, flatten, ChangeFeed, CommentNode, CommentService, Error, Subscription,
    ThreadAction, ThreadConfig, ThreadRow,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LoadState {
    Idle,

    /// Only ever set by the fetch that follows a mount
    Loading,

    Ready,

    /// The fetch that follows a mount failed; comments from before are kept
    Error(String),
}

/// Everything a view of the post's comment section displays
#[derive(Clone, Debug)]
pub struct ThreadView {
    pub state: LoadState,

    /// Flat, in the order the service returned them
    pub comments: Vec<Comment>,
    pub tree: Vec<CommentNode>,
    pub expanded: bool,

    auto_expanded: bool,

    // Sequence number of the fetch the comments come from
    fetched: u64,
}

impl ThreadView {
    fn new() -> ThreadView {
        ThreadView {
            state: LoadState::Idle,
            comments: Vec::new(),
            tree: Vec::new(),
            expanded: false,
            auto_expanded: false,
            fetched: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.comments.len()
    }

    fn apply(&mut self, comments: Vec<Comment>) {
        if !self.auto_expanded && !comments.is_empty() {
            self.expanded = true;
            self.auto_expanded = true;
        }
        self.tree = assemble(comments.clone());
        self.comments = comments;
        self.state = LoadState::Ready;
    }
}

struct Inner {
    post: PostId,
    service: Arc<dyn CommentService>,
    config: ThreadConfig,
    view: watch::Sender<ThreadView>,

    // Bumped on every mount and unmount, so that responses to older fetches get dropped
    generation: AtomicU64,
    mounted: AtomicBool,

    // Taken before each list request; a response older than the displayed one is dropped
    fetches: AtomicU64,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.mounted.load(Ordering::Acquire) && self.generation.load(Ordering::Acquire) == generation
    }

    /// Replaces the comments with the service's. Failures only surface if `loud`.
    async fn fetch(&self, generation: u64, loud: bool) -> Result<(), Error> {
        let seq = self.fetches.fetch_add(1, Ordering::AcqRel) + 1;
        let res = self.service.list_comments(self.post).await;
        if !self.is_current(generation) {
            tracing::debug!(post=?self.post, "dropping comments fetched for an unmounted thread");
            return Ok(());
        }
        match res {
            Ok(comments) => {
                let applied = self.view.send_if_modified(|v| {
                    if seq < v.fetched {
                        return false;
                    }
                    v.fetched = seq;
                    v.apply(comments);
                    true
                });
                if !applied {
                    tracing::debug!(post=?self.post, "dropping comments older than the displayed ones");
                }
                Ok(())
            }
            Err(e) if loud => {
                let message = e.to_string();
                self.view.send_if_modified(|v| {
                    if seq < v.fetched {
                        return false;
                    }
                    v.state = LoadState::Error(message);
                    true
                });
                Err(e)
            }
            Err(e) => {
                tracing::warn!(post=?self.post, "background refresh of comments failed: {e:#}");
                Ok(())
            }
        }
    }

    async fn run_feed(self: Arc<Self>, mut sub: Subscription, generation: u64) {
        let mut closed = false;
        while !closed && sub.next().await.is_some() {
            // one re-fetch per burst of notifications
            tokio::time::sleep(self.config.coalesce_window).await;
            loop {
                match sub.next().now_or_never() {
                    Some(Some(_)) => continue,
                    Some(None) => closed = true,
                    None => (),
                }
                break;
            }
            if !self.is_current(generation) {
                return;
            }
            // silent refreshes never fail
            let _ = self.fetch(generation, false).await;
        }
        tracing::debug!(post=?self.post, "change feed closed");
    }
}

/// Owner of the comment list of one feedback post.
///
/// All mutations go through it, and are followed by a full re-fetch: the
/// displayed comments are always exactly what the service returned last.
pub struct Coordinator {
    inner: Arc<Inner>,
    feed_task: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    pub fn new(post: PostId, service: Arc<dyn CommentService>, config: ThreadConfig) -> Coordinator {
        let (view, _) = watch::channel(ThreadView::new());
        Coordinator {
            inner: Arc::new(Inner {
                post,
                service,
                config,
                view,
                generation: AtomicU64::new(0),
                mounted: AtomicBool::new(false),
                fetches: AtomicU64::new(0),
            }),
            feed_task: Mutex::new(None),
        }
    }

    pub fn post(&self) -> PostId {
        self.inner.post
    }

    pub fn view(&self) -> ThreadView {
        self.inner.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ThreadView> {
        self.inner.view.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::Acquire)
    }

    /// Rows to display for `viewer` at wall-clock time `now`
    pub fn rows(&self, viewer: &Actor, now: Time) -> Vec<ThreadRow> {
        flatten(
            &self.inner.view.borrow().tree,
            viewer,
            now,
            self.inner.config.max_depth,
        )
    }

    /// Subscribes to the post's change feed and fetches its comments.
    ///
    /// The view keeps working without live updates if the change feed is
    /// unavailable. Mounting an already-mounted coordinator mounts it anew.
    pub async fn mount<F: ?Sized + ChangeFeed>(&self, feed: &F) -> Result<(), Error> {
        self.unmount();
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.mounted.store(true, Ordering::Release);
        self.inner
            .view
            .send_modify(|v| v.state = LoadState::Loading);

        match feed.subscribe(self.inner.post).await {
            Ok(sub) if self.inner.is_current(generation) => {
                let task = tokio::spawn(self.inner.clone().run_feed(sub, generation));
                *self.feed_task.lock() = Some(task);
            }
            Ok(_) => return Ok(()),
            Err(e) => {
                tracing::warn!(post=?self.inner.post, "failed subscribing to change feed, comments will not update live: {e:#}")
            }
        }

        self.inner.fetch(generation, true).await
    }

    /// Releases the change feed subscription; responses still in flight will be ignored
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::Release);
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(task) = self.feed_task.lock().take() {
            task.abort();
        }
    }

    pub fn set_expanded(&self, expanded: bool) {
        self.inner.view.send_modify(|v| v.expanded = expanded);
    }

    pub fn toggle_expanded(&self) {
        self.inner.view.send_modify(|v| v.expanded = !v.expanded);
    }

    pub async fn submit(&self, content: String) -> Result<(), Error> {
        self.add(NewComment {
            content,
            parent_comment_id: None,
        })
        .await
    }

    pub async fn reply(&self, parent: CommentId, content: String) -> Result<(), Error> {
        self.add(NewComment {
            content,
            parent_comment_id: Some(parent),
        })
        .await
    }

    pub async fn edit(&self, comment_id: CommentId, content: String) -> Result<(), Error> {
        let generation = self.mounted_generation()?;
        let content = String::from(crate::api::validate_content(&content)?);
        self.inner
            .service
            .edit_comment(self.inner.post, EditComment { comment_id, content })
            .await?;
        self.after_mutation(generation).await
    }

    pub async fn delete(&self, comment_id: CommentId) -> Result<(), Error> {
        let generation = self.mounted_generation()?;
        self.inner
            .service
            .delete_comment(self.inner.post, DeleteComment { comment_id })
            .await?;
        self.after_mutation(generation).await
    }

    pub async fn dispatch(&self, action: ThreadAction) -> Result<(), Error> {
        match action {
            ThreadAction::Reply(c) => self.add(c).await,
            ThreadAction::Edit(e) => self.edit(e.comment_id, e.content).await,
            ThreadAction::Delete(d) => self.delete(d.comment_id).await,
        }
    }

    async fn add(&self, comment: NewComment) -> Result<(), Error> {
        let generation = self.mounted_generation()?;
        let comment = NewComment {
            content: String::from(comment.validate()?),
            parent_comment_id: comment.parent_comment_id,
        };
        self.inner
            .service
            .add_comment(self.inner.post, comment)
            .await?;
        self.after_mutation(generation).await
    }

    fn mounted_generation(&self) -> Result<u64, Error> {
        let generation = self.inner.generation.load(Ordering::Acquire);
        match self.inner.is_current(generation) {
            true => Ok(generation),
            false => Err(Error::NotMounted),
        }
    }

    async fn after_mutation(&self, generation: u64) -> Result<(), Error> {
        // the mutation went through, a failed refresh only means a stale view
        let _ = self.inner.fetch(generation, false).await;
        Ok(())
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.unmount();
    }
}
