use crate::{Actor, Comment, Time};

/// Minutes after creation during which an author may still edit or delete a comment
pub const EDIT_WINDOW_MINUTES: i64 = 15;

pub fn within_edit_window(created_at: Time, now: Time) -> bool {
    now - created_at <= chrono::Duration::minutes(EDIT_WINDOW_MINUTES)
}

/// What an actor may currently do to a comment.
///
/// This must be recomputed against the current wall clock every time it is
/// displayed, as comments silently leave the edit window. It is only a hint
/// for the interface: the server checks the same rules on every mutation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Eligibility {
    pub can_edit: bool,
    pub can_delete: bool,
}

impl Eligibility {
    pub fn compute(comment: &Comment, actor: &Actor, now: Time) -> Eligibility {
        let own_and_recent = comment.is_own(actor) && within_edit_window(comment.created_at, now);
        Eligibility {
            can_edit: own_and_recent,
            can_delete: actor.is_admin() || own_and_recent,
        }
    }
}
