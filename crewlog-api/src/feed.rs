use crate::PostId;

/// Message pushed on the change feed websocket.
///
/// Changes carry no comment payload: receivers are expected to re-fetch.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum FeedMessage {
    Pong,
    CommentsChanged(PostId),
}
