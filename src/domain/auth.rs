use super::ports::SessionProvider;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Hosted-auth messages that are shown to users in their own words.
const LOCALIZED_AUTH_MESSAGES: [(&str, &str); 4] = [
    ("User already registered", "Este correo ya está registrado"),
    ("Auth session missing", "Su email no ha sido confirmado"),
    ("Email not confirmed", "Su email no ha sido confirmado"),
    ("Invalid login credentials", "Credenciales incorrectas"),
];

/// Maps a recognized hosted-auth error to its user-facing message; anything
/// else passes through unchanged.
pub fn localize_auth_error(message: &str) -> String {
    LOCALIZED_AUTH_MESSAGES
        .iter()
        .find(|(raw, _)| message.contains(raw))
        .map(|(_, localized)| localized.to_string())
        .unwrap_or_else(|| message.to_string())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub confirmed_at: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl User {
    /// Display name split into first name and the rest.
    pub fn name_parts(&self) -> (String, String) {
        let display_name = self.user_metadata.display_name.as_deref().unwrap_or("");
        let mut words = display_name.split_whitespace();
        let first = words.next().unwrap_or("").to_string();
        let rest = words.collect::<Vec<_>>().join(" ");
        (first, rest)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: User,
}

#[async_trait]
impl SessionProvider for Session {
    async fn access_token(&self) -> Result<Option<String>> {
        Ok(Some(self.access_token.clone()))
    }
}

/// Result of a sign-up; unconfirmed accounts have to verify their email
/// before they get a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUp {
    pub user: User,
    pub needs_email_verification: bool,
}
