use crate::{Error, UserId, Uuid, STUB_UUID};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct PostId(pub Uuid);

impl PostId {
    pub fn stub() -> PostId {
        PostId(STUB_UUID)
    }
}

/// Feedback post owning a comment thread
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub title: String,

    /// If set, the author's identity is hidden from non-admin viewers
    pub anonymous: bool,
}

/// Admin-only provisioning request
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewPost {
    pub id: PostId,
    pub author_id: UserId,
    pub title: String,
    pub anonymous: bool,
}

impl NewPost {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.title)
    }

    pub fn into_post(self) -> Post {
        Post {
            id: self.id,
            author_id: self.author_id,
            title: self.title,
            anonymous: self.anonymous,
        }
    }
}
