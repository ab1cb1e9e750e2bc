use crate::domain::ports::{FunctionInvokerRef, SessionRef};
use reqwest::Url;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::warn;

pub const AVATAR_FUNCTION: &str = "generate-user-avatar";

const INITIALS_AVATAR_URL: &str = "https://api.dicebear.com/7.x/initials/svg";

/// Initials avatar used whenever the avatar function cannot help.
pub fn fallback_avatar_url(name: &str) -> String {
    match Url::parse(INITIALS_AVATAR_URL) {
        Ok(mut url) => {
            url.set_query(Some(&format!(
                "seed={}&backgroundColor=red",
                encode_component(name)
            )));
            url.to_string()
        }
        Err(_) => INITIALS_AVATAR_URL.to_string(),
    }
}

/// URI component encoding: spaces become `%20`, not `+`.
fn encode_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Generates profile avatars through the hosted function, remembering once it
/// has been found unavailable.
pub struct AvatarService {
    functions: FunctionInvokerRef,
    session: SessionRef,
    available: RwLock<Option<bool>>,
}

impl AvatarService {
    pub fn new(functions: FunctionInvokerRef, session: SessionRef) -> Self {
        Self {
            functions,
            session,
            available: RwLock::new(None),
        }
    }

    /// `None` until a call or [`AvatarService::probe`] has settled it.
    pub async fn is_available(&self) -> Option<bool> {
        *self.available.read().await
    }

    /// Calls the function once with a sample name to learn whether it is up.
    pub async fn probe(&self) {
        let Ok(Some(token)) = self.session.access_token().await else {
            return;
        };
        let result = self
            .functions
            .invoke(AVATAR_FUNCTION, &json!({ "firstName": "test" }), &token)
            .await;
        if let Err(e) = &result {
            warn!(error = %e, "avatar function not available");
        }
        *self.available.write().await = Some(result.is_ok());
    }

    /// Avatar URL for `first_name`. Never fails.
    pub async fn generate(&self, first_name: &str) -> String {
        if self.is_available().await == Some(false) {
            return fallback_avatar_url(first_name);
        }

        let token = match self.session.access_token().await {
            Ok(Some(token)) => token,
            _ => return fallback_avatar_url(first_name),
        };

        match self
            .functions
            .invoke(AVATAR_FUNCTION, &json!({ "firstName": first_name }), &token)
            .await
        {
            Ok(data) => match data.get("avatarUrl").and_then(Value::as_str) {
                Some(url) if !url.is_empty() => url.to_string(),
                _ => fallback_avatar_url(first_name),
            },
            Err(e) => {
                warn!(error = %e, "avatar function failed, using initials avatar");
                *self.available.write().await = Some(false);
                fallback_avatar_url(first_name)
            }
        }
    }
}
