use crate::{
    api::{
        self, Actor, AuthorKind, Comment, CommentId, DeleteComment, EditComment, Eligibility,
        NewComment, Time,
    },
    CommentNode,
};

/// Request emitted by a comment row, executed by the coordinator
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ThreadAction {
    Reply(NewComment),
    Edit(EditComment),
    Delete(DeleteComment),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Affordances {
    pub can_reply: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

/// One comment as displayed, with its position in the thread
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadRow {
    pub comment: Comment,

    /// 0 for top-level comments
    pub depth: usize,

    /// Visual nesting, capped at the maximum depth
    pub indent: usize,

    pub badge: AuthorKind,
    pub is_own: bool,
    pub edited: bool,
    pub affordances: Affordances,
}

impl ThreadRow {
    pub fn reply(&self, content: String) -> Option<ThreadAction> {
        self.affordances.can_reply.then(|| {
            ThreadAction::Reply(NewComment {
                content,
                parent_comment_id: Some(self.comment.id),
            })
        })
    }

    pub fn delete(&self) -> Option<ThreadAction> {
        self.affordances.can_delete.then(|| {
            ThreadAction::Delete(DeleteComment {
                comment_id: self.comment.id,
            })
        })
    }
}

/// Lays the thread out depth-first, as it is to be displayed.
///
/// Affordances depend on `now`, so the result must not be kept around:
/// comments silently leave the edit window.
pub fn flatten(tree: &[CommentNode], viewer: &Actor, now: Time, max_depth: usize) -> Vec<ThreadRow> {
    let mut res = Vec::with_capacity(tree.iter().map(|n| n.count()).sum());
    let mut todo = tree.iter().rev().map(|n| (n, 0)).collect::<Vec<_>>();
    while let Some((n, depth)) = todo.pop() {
        let eligibility = Eligibility::compute(&n.comment, viewer, now);
        res.push(ThreadRow {
            comment: n.comment.clone(),
            depth,
            indent: std::cmp::min(depth, max_depth),
            badge: n.comment.author_kind,
            is_own: n.comment.is_own(viewer),
            edited: n.comment.is_edited(),
            affordances: Affordances {
                can_reply: depth < max_depth,
                can_edit: eligibility.can_edit,
                can_delete: eligibility.can_delete,
            },
        });
        todo.extend(n.replies.iter().rev().map(|r| (r, depth + 1)));
    }
    res
}

/// Inline edition state of a single comment
#[derive(Clone, Debug, Default)]
pub struct CommentEditor {
    editing: Option<(CommentId, String)>,
    draft: String,
}

impl CommentEditor {
    pub fn new() -> CommentEditor {
        CommentEditor::default()
    }

    pub fn begin(&mut self, comment: &Comment) {
        self.editing = Some((comment.id, comment.content.clone()));
        self.draft = comment.content.clone();
    }

    pub fn editing(&self) -> Option<CommentId> {
        self.editing.as_ref().map(|(id, _)| *id)
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    /// Leaves edition mode with the trimmed draft, or stays in it if the draft is not valid
    pub fn commit(&mut self) -> Result<ThreadAction, api::Error> {
        let comment_id = match &self.editing {
            Some((id, _)) => *id,
            None => return Err(api::Error::NotFound),
        };
        let content = String::from(api::validate_content(&self.draft)?);
        self.editing = None;
        self.draft.clear();
        Ok(ThreadAction::Edit(EditComment {
            comment_id,
            content,
        }))
    }

    /// Restores the original content, returning it
    pub fn cancel(&mut self) -> Option<String> {
        let (_, original) = self.editing.take()?;
        self.draft.clear();
        Some(original)
    }
}
