//! Unguessable identifiers for rooms and clients.
//!
//! Ids are 16 bytes from the thread-local CSPRNG, base64url encoded without
//! padding. The alphabet is `[A-Za-z0-9_-]`, so ids are safe in URL paths.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use std::borrow::Borrow;
use std::fmt;

/// Random bytes per token.
pub const TOKEN_BYTES: usize = 16;

/// Generate a random URL-safe token.
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Check that a string only uses the token alphabet.
#[must_use]
pub fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

macro_rules! token_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh random id.
            #[must_use]
            pub fn generate() -> Self {
                Self(generate_token())
            }

            /// Get the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the id, returning the inner string.
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

token_id!(
    /// Identifier of a room, minted when the room is created.
    RoomId
);

token_id!(
    /// Identifier of a joined client, minted by the server at join time.
    ClientId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_format() {
        let token = generate_token();
        // 16 bytes -> 22 base64 characters without padding
        assert_eq!(token.len(), 22);
        assert!(is_valid_token(&token));
    }

    #[test]
    fn test_room_ids_are_distinct() {
        let ids: HashSet<RoomId> = (0..10_000).map(|_| RoomId::generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_token_validation() {
        assert!(is_valid_token("abc-DEF_123"));
        assert!(!is_valid_token(""));
        assert!(!is_valid_token("has space"));
        assert!(!is_valid_token("slash/"));
        assert!(!is_valid_token("dot."));
        assert!(!is_valid_token("ümlaut"));
    }

    #[test]
    fn test_id_conversions() {
        let id: ClientId = "client-1".into();
        assert_eq!(id.as_str(), "client-1");
        assert_eq!(id.to_string(), "client-1");
        assert_eq!(String::from(id), "client-1");
    }
}
