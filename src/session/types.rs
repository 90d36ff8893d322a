//! Wire and snapshot types for the session core.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Cached user snapshot, persisted next to the token.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct User {
    #[serde(deserialize_with = "id_from_scalar")]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

fn id_from_scalar<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(id) => Ok(id),
        serde_json::Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "user id must be a string or number, got {other}"
        ))),
    }
}

/// Partial update merged into the cached snapshot.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.name.is_none()
    }

    #[must_use]
    pub fn apply(&self, user: &User) -> User {
        let mut merged = user.clone();
        if let Some(username) = &self.username {
            merged.username.clone_from(username);
        }
        if let Some(email) = &self.email {
            merged.email.clone_from(email);
        }
        if let Some(name) = &self.name {
            merged.name.clone_from(name);
        }
        merged
    }
}

/// Result of a successful login/register exchange.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct AuthGrant {
    pub user: User,
    pub token: String,
}

impl std::fmt::Debug for AuthGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGrant")
            .field("user", &self.user)
            .field("token", &"***")
            .finish()
    }
}

/// Login with a username or an email.
#[derive(Clone, Debug)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: SecretString,
}

impl LoginRequest {
    #[must_use]
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// # Errors
    /// Returns `Error::Validation` when either field is blank.
    pub fn validate(&self) -> Result<()> {
        if self.identifier.trim().is_empty() || self.password.expose_secret().is_empty() {
            return Err(validation("Username/email and password are required."));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub name: String,
    pub password: SecretString,
}

impl RegisterRequest {
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            name: name.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Local profile checks run before anything is sent.
    ///
    /// # Errors
    /// Returns `Error::Validation` describing the first failing field.
    pub fn validate(&self) -> Result<()> {
        let username = self.username.trim();
        if !(3..=50).contains(&username.chars().count()) || !valid_username(username) {
            return Err(validation(
                "Username must be 3-50 characters of letters, digits or underscores.",
            ));
        }
        let email = self.email.trim();
        if email.chars().count() > 255 || !valid_email(email) {
            return Err(validation("Email address is invalid."));
        }
        if !(2..=255).contains(&self.name.trim().chars().count()) {
            return Err(validation("Name must be 2-255 characters."));
        }
        if !(6..=100).contains(&self.password.expose_secret().chars().count()) {
            return Err(validation("Password must be 6-100 characters."));
        }
        Ok(())
    }
}

fn validation(message: &str) -> Error {
    Error::Validation {
        status: 422,
        message: message.to_string(),
    }
}

fn valid_username(username: &str) -> bool {
    Regex::new(r"^[a-zA-Z0-9_]+$").is_ok_and(|regex| regex.is_match(username))
}

fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}
