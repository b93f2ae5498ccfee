//! Password derivation for the sync bot account.
//!
//! The homeserver's shared-secret auth provider expects the password to be
//! the hex encoded HMAC-SHA-512 of the user id, keyed with the shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Derive the login password for `user_id`.
pub fn derive_password(user_id: &str, shared_secret: &str) -> String {
    let mut mac = HmacSha512::new_from_slice(shared_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(user_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc4231_vector() {
        // RFC 4231, test case 2
        let password = derive_password("what do ya want for nothing?", "Jefe");
        assert_eq!(
            password,
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
             9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn test_password_depends_on_user_and_secret() {
        let base = derive_password("@sync:a.messenger.schule", "secret");

        assert_eq!(base.len(), 128);
        assert_ne!(base, derive_password("@sync:b.messenger.schule", "secret"));
        assert_ne!(base, derive_password("@sync:a.messenger.schule", "other"));
    }
}
