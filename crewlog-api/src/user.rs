use crate::{Uuid, STUB_UUID};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn stub() -> UserId {
        UserId(STUB_UUID)
    }
}

/// Admins moderate every thread, submitters are the pilots and crew posting feedback
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorKind {
    Admin,
    Submitter,
}

impl AuthorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorKind::Admin => "admin",
            AuthorKind::Submitter => "submitter",
        }
    }

    pub fn parse(s: &str) -> Option<AuthorKind> {
        match s {
            "admin" => Some(AuthorKind::Admin),
            "submitter" => Some(AuthorKind::Submitter),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,

    /// Job title shown next to the name, eg. "Captain"
    pub role: String,

    pub kind: AuthorKind,
}

impl User {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            kind: self.kind,
        }
    }
}

/// Identity of whoever is performing an action
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Actor {
    pub id: UserId,
    pub kind: AuthorKind,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.kind == AuthorKind::Admin
    }
}
