use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde_json::json;
use uuid::Uuid;

use crate::{CommentId, MAX_CONTENT_CHARS};

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not found")]
    NotFound,

    #[error("Comment is empty")]
    EmptyContent,

    #[error("Comment is {0} characters long, the maximum is {}", MAX_CONTENT_CHARS)]
    ContentTooLong(usize),

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Parent comment {0:?} is not part of this thread")]
    InvalidParent(CommentId),

    #[error("Comments can only be changed in the {} minutes after posting", crate::EDIT_WINDOW_MINUTES)]
    EditWindowExpired,

    #[error("Uuid already used {0}")]
    UuidAlreadyUsed(Uuid),

    #[error("Invalid character in name {0:?}")]
    InvalidName(String),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::EmptyContent => StatusCode::BAD_REQUEST,
            Error::ContentTooLong(_) => StatusCode::BAD_REQUEST,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::InvalidParent(_) => StatusCode::BAD_REQUEST,
            Error::EditWindowExpired => StatusCode::FORBIDDEN,
            Error::UuidAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::InvalidName(_) => StatusCode::BAD_REQUEST,
            Error::InvalidBody(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable description, sent as the `error_detail` of failure envelopes
    pub fn contents(&self) -> serde_json::Value {
        match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::NotFound => json!({
                "message": "not found",
                "type": "not-found",
            }),
            Error::EmptyContent => json!({
                "message": "comment is empty",
                "type": "empty-content",
            }),
            Error::ContentTooLong(len) => json!({
                "message": "comment is too long",
                "type": "content-too-long",
                "length": len,
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::InvalidParent(c) => json!({
                "message": "parent comment is not part of this thread",
                "type": "invalid-parent",
                "comment": c.0,
            }),
            Error::EditWindowExpired => json!({
                "message": "edit window expired",
                "type": "edit-window-expired",
            }),
            Error::UuidAlreadyUsed(u) => json!({
                "message": "uuid conflict",
                "type": "conflict-uuid",
                "uuid": u,
            }),
            Error::InvalidName(n) => json!({
                "message": "there was an invalid character in a user name",
                "type": "invalid-name",
                "name": n,
            }),
            Error::InvalidBody(reason) => json!({
                "message": "request body could not be parsed",
                "type": "invalid-body",
                "reason": reason,
            }),
        }
    }

    pub fn parse(data: &serde_json::Value) -> anyhow::Result<Error> {
        let uuid_field = |field: &str| {
            data.get(field)
                .and_then(|uuid| uuid.as_str())
                .and_then(|uuid| Uuid::from_str(uuid).ok())
        };
        let string_field = |field: &str| {
            data.get(field)
                .and_then(|s| s.as_str())
                .map(String::from)
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(string_field("message").unwrap_or_default()),
                "permission-denied" => Error::PermissionDenied,
                "not-found" => Error::NotFound,
                "empty-content" => Error::EmptyContent,
                "content-too-long" => Error::ContentTooLong(
                    data.get("length")
                        .and_then(|l| l.as_u64())
                        .and_then(|l| usize::try_from(l).ok())
                        .ok_or_else(|| anyhow!("content-too-long error without a length"))?,
                ),
                "null-byte" => Error::NullByteInString(string_field("string").ok_or_else(
                    || anyhow!("error is a null-byte-in-string without a string"),
                )?),
                "invalid-parent" => Error::InvalidParent(CommentId(
                    uuid_field("comment")
                        .ok_or_else(|| anyhow!("invalid-parent error without a comment id"))?,
                )),
                "edit-window-expired" => Error::EditWindowExpired,
                "conflict-uuid" => Error::UuidAlreadyUsed(
                    uuid_field("uuid")
                        .ok_or_else(|| anyhow!("error is a uuid conflict without a proper uuid"))?,
                ),
                "invalid-name" => Error::InvalidName(string_field("name").ok_or_else(|| {
                    anyhow!("error is about an invalid name but no name was provided")
                })?),
                "invalid-body" => Error::InvalidBody(string_field("reason").unwrap_or_default()),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }

    pub fn parse_bytes(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        Error::parse(&data)
    }
}
