//! Users

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Variant;
use crate::pagination::PageRequest;
use crate::patch::Patch;
use crate::validation::{Validate, ValidationErrors};

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Guest,
}

impl Variant for Role {
    const ALL: &'static [Self] = &[Self::Admin, Self::User, Self::Guest];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Guest => "guest",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Overwrite the fields the update supplies. Timestamps are left to the caller.
    pub fn apply(&mut self, update: UserUpdate) {
        update.name.apply_to(&mut self.name);
        update.email.apply_to(&mut self.email);
        update.role.apply_to(&mut self.role);
    }
}

/// Validated input for creating a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Validated partial update. `Null` never reaches here: every user field is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: Patch<String>,
    pub email: Patch<String>,
    pub role: Patch<Role>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl Validate for CreateUserRequest {
    type Valid = NewUser;

    fn validate(self) -> Result<NewUser, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = errors.text("name", self.name, MIN_NAME_LEN, MAX_NAME_LEN);
        let email = errors.email("email", self.email);
        let role = errors.variant::<Role>("role", self.role);

        match (name, email, role) {
            (Some(name), Some(email), Some(role)) => Ok(NewUser { name, email, role }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub email: Patch<String>,
    #[serde(default)]
    pub role: Patch<String>,
}

impl Validate for UpdateUserRequest {
    type Valid = UserUpdate;

    fn validate(self) -> Result<UserUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = errors.patch_text("name", self.name, MIN_NAME_LEN, MAX_NAME_LEN);
        let email = match errors.patch_required("email", self.email) {
            Some(Patch::Value(v)) => errors.email("email", Some(v)).map(Patch::Value),
            other => other,
        };
        let role = errors.patch_variant::<Role>("role", self.role);

        match (name, email, role) {
            (Some(name), Some(email), Some(role)) => Ok(UserUpdate { name, email, role }),
            _ => Err(errors),
        }
    }
}

/// Query string for `GET /users`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u64>,
}

impl Validate for UserListQuery {
    type Valid = (UserFilter, PageRequest);

    fn validate(self) -> Result<Self::Valid, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let role = errors.optional_variant::<Role>("role", self.role);
        let page = PageRequest::from_query(self.limit, self.offset);

        match role {
            Some(role) => Ok((UserFilter { role }, page)),
            None => Err(errors),
        }
    }
}
