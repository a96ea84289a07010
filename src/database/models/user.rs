use std::fmt;
use std::str::FromStr;

use mongodb::bson::{doc, DateTime, Document};
use serde::{Deserialize, Serialize};

/// Access role stored on every user record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Admin,
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Admin => "Admin",
            Role::Moderator => "Moderator",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "User" => Ok(Role::User),
            "Admin" => Ok(Role::Admin),
            "Moderator" => Ok(Role::Moderator),
            other => Err(format!(
                "'{}' is not a valid role. Use either `User`, `Admin` or `Moderator`",
                other
            )),
        }
    }
}

/// Fields a client may not set through the profile body
const RESERVED_FIELDS: [&str; 4] = ["_id", "email", "role", "createdAt"];

/// Build a new user document: the client profile plus identity, default role
/// and creation time.
pub fn new_user_document(email: &str, profile: Document) -> Document {
    let mut user = doc! {
        "email": email,
        "role": Role::default().as_str(),
        "createdAt": DateTime::now(),
    };
    for (key, value) in profile {
        if !RESERVED_FIELDS.contains(&key.as_str()) {
            user.insert(key, value);
        }
    }
    user
}
