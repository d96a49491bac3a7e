// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth2 client credentials.

use std::fmt;

/// Client id and secret used to mint bearer tokens.
///
/// The secret is only reachable through [`ClientCredentials::client_secret`].
/// `Debug` shows neither the secret nor the full client id.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Build credentials from optional form fields, rejecting blank values.
    pub fn from_parts(client_id: Option<&str>, client_secret: Option<&str>) -> Option<Self> {
        let client_id = client_id.map(str::trim).filter(|v| !v.is_empty())?;
        let client_secret = client_secret.map(str::trim).filter(|v| !v.is_empty())?;
        Some(Self::new(client_id, client_secret))
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Short prefix of the client id, safe to log.
    pub fn redacted_id(&self) -> String {
        let shown = (self.client_id.chars().count() / 2).min(4);
        let prefix: String = self.client_id.chars().take(shown).collect();
        format!("{prefix}***")
    }

    /// Whether both halves are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.redacted_id())
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_secret() {
        let credentials = ClientCredentials::new("abc", "super-secret");
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("abc"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("a***"));
    }

    #[test]
    fn from_parts_rejects_blank_fields() {
        assert!(ClientCredentials::from_parts(Some("abc"), Some("  ")).is_none());
        assert!(ClientCredentials::from_parts(None, Some("xyz")).is_none());

        let credentials = ClientCredentials::from_parts(Some(" abc "), Some("xyz")).unwrap();
        assert_eq!(credentials.client_id, "abc");
        assert_eq!(credentials.client_secret(), "xyz");
        assert!(credentials.is_complete());
    }

    #[test]
    fn redacted_id_keeps_at_most_four_characters() {
        assert_eq!(ClientCredentials::new("client-1234", "s").redacted_id(), "clie***");
        assert_eq!(ClientCredentials::new("ab", "s").redacted_id(), "a***");
        assert_eq!(ClientCredentials::new("", "s").redacted_id(), "***");
    }

    #[test]
    fn empty_credentials_are_incomplete() {
        assert!(!ClientCredentials::new("", "xyz").is_complete());
    }
}
