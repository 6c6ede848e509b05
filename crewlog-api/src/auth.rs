use crate::{AuthorKind, Error, User, UserId, STUB_UUID};

use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub Uuid);

impl AuthToken {
    pub fn stub() -> AuthToken {
        AuthToken(STUB_UUID)
    }
}

/// Admin-only provisioning request, answered with a session token for the new user
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewUser {
    pub id: UserId,
    pub display_name: String,
    pub role: String,
    pub kind: AuthorKind,
}

impl NewUser {
    pub fn new(display_name: String, role: String, kind: AuthorKind) -> NewUser {
        NewUser {
            id: UserId(Uuid::new_v4()),
            display_name,
            role,
            kind,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.display_name)?;
        crate::validate_string(&self.role)?;
        if self.display_name.trim().is_empty() || self.display_name.chars().any(char::is_control)
        {
            return Err(Error::InvalidName(self.display_name.clone()));
        }
        Ok(())
    }

    pub fn into_user(self) -> User {
        User {
            id: self.id,
            display_name: self.display_name,
            role: self.role,
            kind: self.kind,
        }
    }
}
