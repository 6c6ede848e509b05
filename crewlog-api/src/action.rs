use anyhow::Context;

use crate::{Actor, CommentId, Db, Error, PostId, Time};

/// Body of `POST /{base}/{post_id}/comments`
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<CommentId>,
}

/// Body of `PATCH /{base}/{post_id}/comments`
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EditComment {
    pub comment_id: CommentId,
    pub content: String,
}

/// Body of `DELETE /{base}/{post_id}/comments`
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DeleteComment {
    pub comment_id: CommentId,
}

// The `authorize` functions below are the source of truth for who may do what.
// The outer Result reports infrastructure failures, the inner one rule violations.

impl NewComment {
    pub fn validate(&self) -> Result<&str, Error> {
        crate::validate_content(&self.content)
    }

    pub async fn authorize<D: ?Sized + Db>(
        &self,
        db: &mut D,
        post: PostId,
        _actor: &Actor,
    ) -> anyhow::Result<Result<(), Error>> {
        if db
            .get_post(post)
            .await
            .with_context(|| format!("fetching post {post:?}"))?
            .is_none()
        {
            return Ok(Err(Error::NotFound));
        }
        if let Some(parent) = self.parent_comment_id {
            let parent_comment = db
                .get_comment(parent)
                .await
                .with_context(|| format!("fetching parent comment {parent:?}"))?;
            match parent_comment {
                Some(p) if p.post_id == post => (),
                _ => return Ok(Err(Error::InvalidParent(parent))),
            }
        }
        Ok(Ok(()))
    }
}

impl EditComment {
    pub fn validate(&self) -> Result<&str, Error> {
        crate::validate_content(&self.content)
    }

    pub async fn authorize<D: ?Sized + Db>(
        &self,
        db: &mut D,
        post: PostId,
        actor: &Actor,
        now: Time,
    ) -> anyhow::Result<Result<(), Error>> {
        let comment = match db
            .get_comment(self.comment_id)
            .await
            .with_context(|| format!("fetching comment {:?}", self.comment_id))?
        {
            Some(c) if c.post_id == post => c,
            _ => return Ok(Err(Error::NotFound)),
        };
        // nobody, not even an admin, edits someone else's words
        if !comment.is_own(actor) {
            return Ok(Err(Error::PermissionDenied));
        }
        if !crate::within_edit_window(comment.created_at, now) {
            return Ok(Err(Error::EditWindowExpired));
        }
        Ok(Ok(()))
    }
}

impl DeleteComment {
    pub async fn authorize<D: ?Sized + Db>(
        &self,
        db: &mut D,
        post: PostId,
        actor: &Actor,
        now: Time,
    ) -> anyhow::Result<Result<(), Error>> {
        let comment = match db
            .get_comment(self.comment_id)
            .await
            .with_context(|| format!("fetching comment {:?}", self.comment_id))?
        {
            Some(c) if c.post_id == post => c,
            _ => return Ok(Err(Error::NotFound)),
        };
        if actor.is_admin() {
            return Ok(Ok(()));
        }
        if !comment.is_own(actor) {
            return Ok(Err(Error::PermissionDenied));
        }
        if !crate::within_edit_window(comment.created_at, now) {
            return Ok(Err(Error::EditWindowExpired));
        }
        Ok(Ok(()))
    }
}
