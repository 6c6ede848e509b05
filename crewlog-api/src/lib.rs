use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

mod action;
pub use action::{DeleteComment, EditComment, NewComment};

mod auth;
pub use auth::{AuthToken, NewUser};

mod comment;
pub use comment::{Comment, CommentId, ANONYMOUS};

mod db;
pub use db::Db;

mod envelope;
pub use envelope::Envelope;

mod error;
pub use error::Error;

mod feed;
pub use feed::FeedMessage;

mod policy;
pub use policy::{within_edit_window, Eligibility, EDIT_WINDOW_MINUTES};

mod post;
pub use post::{NewPost, Post, PostId};

mod user;
pub use user::{Actor, AuthorKind, User, UserId};

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

/// Maximum number of characters of a comment, counted after trimming
pub const MAX_CONTENT_CHARS: usize = 2000;

/// Name of the cookie that can carry a session token instead of the Authorization header
pub const SESSION_COOKIE: &str = "crewlog-session";

// Postgres rejects null bytes in text columns, so refuse them before they reach the database
pub fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(String::from(s)));
    }
    Ok(())
}

/// Returns the trimmed content, or the reason why it cannot be posted
pub fn validate_content(s: &str) -> Result<&str, Error> {
    validate_string(s)?;
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::EmptyContent);
    }
    let len = s.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Err(Error::ContentTooLong(len));
    }
    Ok(s)
}
