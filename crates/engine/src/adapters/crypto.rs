//! Age decryption backend

use crate::content::Decryptor;
use hearth_crypto::Identity;
use std::sync::Arc;

/// Decrypts age envelopes in-process
#[derive(Clone)]
pub struct AgeDecryptor {
    identities: Arc<[Identity]>,
}

impl AgeDecryptor {
    /// Create a decryptor trying each identity in turn
    pub fn new(identities: Vec<Identity>) -> Self {
        Self {
            identities: identities.into(),
        }
    }

    /// Identities tried on decryption
    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }
}

impl std::fmt::Debug for AgeDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgeDecryptor")
            .field("identities", &self.identities.len())
            .finish()
    }
}

impl Decryptor for AgeDecryptor {
    type Error = hearth_crypto::Error;

    fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>, Self::Error> {
        hearth_crypto::decrypt(encrypted, &self.identities)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_decrypts_with_matching_identity() {
        let wrong = Identity::generate();
        let right = Identity::generate();
        let encrypted =
            hearth_crypto::encrypt(b"secret", &[right.to_public().unwrap()]).unwrap();

        let decryptor = AgeDecryptor::new(vec![wrong, right]);
        assert_eq!(decryptor.decrypt(&encrypted).unwrap(), b"secret");
    }

    #[test]
    fn test_passphrase_identity() {
        let encrypted = hearth_crypto::encrypt_with_passphrase(b"pw-secret", "hunter2").unwrap();
        let decryptor = AgeDecryptor::new(vec![Identity::from_passphrase("hunter2")]);
        assert_eq!(decryptor.decrypt(&encrypted).unwrap(), b"pw-secret");
    }

    #[test]
    fn test_wrong_identity_fails() {
        let encrypted = hearth_crypto::encrypt(
            b"secret",
            &[Identity::generate().to_public().unwrap()],
        )
        .unwrap();
        let decryptor = AgeDecryptor::new(vec![Identity::generate()]);
        assert!(decryptor.decrypt(&encrypted).is_err());
    }
}
