use crate::{Actor, AuthorKind, Post, PostId, Time, User, UserId, Uuid};

/// Display name and role shown instead of the author's on anonymous posts
pub const ANONYMOUS: &str = "Anonymous";

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct CommentId(pub Uuid);

/// Comment as stored by the persistence service: a flat record linked to its parent
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,

    /// None for top-level comments
    pub parent_comment_id: Option<CommentId>,

    // Snapshot of the author at creation time
    pub author_id: UserId,
    pub author_display_name: String,
    pub author_role: String,
    pub author_kind: AuthorKind,

    pub content: String,
    pub created_at: Time,

    /// Equal to created_at until the first edit
    pub updated_at: Time,
}

impl Comment {
    pub fn new(
        id: CommentId,
        post_id: PostId,
        parent_comment_id: Option<CommentId>,
        author: &User,
        content: String,
        now: Time,
    ) -> Comment {
        Comment {
            id,
            post_id,
            parent_comment_id,
            author_id: author.id,
            author_display_name: author.display_name.clone(),
            author_role: author.role.clone(),
            author_kind: author.kind,
            content,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_own(&self, actor: &Actor) -> bool {
        self.author_id == actor.id
    }

    pub fn is_edited(&self) -> bool {
        self.updated_at != self.created_at
    }

    /// Hides the post author's identity from other non-admin viewers of an anonymous post
    pub fn redact_for(&mut self, post: &Post, viewer: &Actor) {
        if post.anonymous
            && !viewer.is_admin()
            && self.author_id == post.author_id
            && self.author_id != viewer.id
        {
            self.author_id = UserId::stub();
            self.author_display_name = String::from(ANONYMOUS);
            self.author_role = String::from(ANONYMOUS);
        }
    }
}
