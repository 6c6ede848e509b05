mod config;
pub use config::{ClientConfig, ThreadConfig};

mod coordinator;
pub use coordinator::{Coordinator, LoadState, ThreadView};

mod error;
pub use error::Error;

mod feed;
pub use feed::WsChangeFeed;

mod http;
pub use http::HttpService;

mod input;
pub use input::{CommentInput, InputMode, Key, KeyIntent, Modifiers, SubmitOutcome};

mod service;
pub use service::{ChangeFeed, Changed, CommentService, Subscription};

mod thread;
pub use thread::{flatten, Affordances, CommentEditor, ThreadAction, ThreadRow};

mod tree;
pub use tree::{assemble, CommentNode};

pub mod api {
    pub use crewlog_api::*;
}
