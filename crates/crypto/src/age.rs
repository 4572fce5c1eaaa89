//! Age encryption and decryption
//!
//! Supports ASCII armored and binary envelopes, native age keys, SSH keys and
//! passphrase (scrypt) wrapped files.

use crate::identity::Identity;
use crate::{Error, Recipient, Result};
use age::secrecy::SecretString;
use std::io::{Read, Write};

/// Helper to convert age errors to our Error type
#[inline]
fn age_error<E: std::fmt::Display>(e: E) -> Error {
    Error::Age(e.to_string())
}

/// Map age decryption errors onto our Error type
///
/// The `plugin` feature of age is not enabled, so plugin errors never occur.
#[inline]
fn map_decrypt_error(e: age::DecryptError) -> Error {
    match e {
        age::DecryptError::NoMatchingKeys
        | age::DecryptError::InvalidMac
        | age::DecryptError::KeyDecryptionFailed => Error::WrongKey,

        age::DecryptError::DecryptionFailed => Error::DecryptionFailed {
            reason: "Age decryption failed".to_string(),
        },
        age::DecryptError::ExcessiveWork { required, target } => Error::DecryptionFailed {
            reason: format!(
                "Excessive work factor: required {required}, target {target}. \
                 This file was encrypted with a higher work factor than this device can handle."
            ),
        },
        age::DecryptError::InvalidHeader => Error::DecryptionFailed {
            reason: "Invalid age header".to_string(),
        },
        age::DecryptError::UnknownFormat => Error::DecryptionFailed {
            reason: "Unknown age format (possibly from a newer version)".to_string(),
        },

        age::DecryptError::Io(io_err) => Error::Io(io_err),
    }
}

/// Encrypt data with the given recipients in ASCII armor format
///
/// # Errors
///
/// - Returns [`Error::NoRecipients`] if the recipients slice is empty
/// - Returns [`Error::Age`] if encryption fails
///
/// # Examples
///
/// ```
/// use hearth_crypto::{decrypt, encrypt, Identity};
///
/// let identity = Identity::generate();
/// let recipient = identity.to_public().unwrap();
///
/// let encrypted = encrypt(b"secret", &[recipient]).unwrap();
/// assert!(encrypted.starts_with(b"-----BEGIN AGE ENCRYPTED FILE-----"));
/// assert_eq!(decrypt(&encrypted, &[identity]).unwrap(), b"secret");
/// ```
pub fn encrypt(data: &[u8], recipients: &[Recipient]) -> Result<Vec<u8>> {
    if recipients.is_empty() {
        return Err(Error::NoRecipients);
    }

    let boxed_recipients: Vec<_> = recipients.iter().map(Recipient::to_boxed).collect();
    let recipient_refs = boxed_recipients
        .iter()
        .map(|r| r.as_ref() as &dyn age::Recipient);

    let encryptor = age::Encryptor::with_recipients(recipient_refs)
        .map_err(|_| Error::Age("Failed to create encryptor with recipients".to_string()))?;

    write_armored(encryptor, data)
}

/// Encrypt data with a passphrase in ASCII armor format
pub fn encrypt_with_passphrase(data: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let encryptor =
        age::Encryptor::with_user_passphrase(SecretString::from(passphrase.to_string()));
    write_armored(encryptor, data)
}

fn write_armored(encryptor: age::Encryptor, data: &[u8]) -> Result<Vec<u8>> {
    let mut encrypted = Vec::new();
    let armor =
        age::armor::ArmoredWriter::wrap_output(&mut encrypted, age::armor::Format::AsciiArmor)
            .map_err(age_error)?;

    let mut writer = encryptor.wrap_output(armor).map_err(age_error)?;
    writer.write_all(data).map_err(age_error)?;
    writer
        .finish()
        .and_then(age::armor::ArmoredWriter::finish)
        .map_err(age_error)?;

    Ok(encrypted)
}

/// Decrypt data with the given identities (supports armor and binary formats)
///
/// Passphrase identities are only offered to passphrase-wrapped files, key
/// identities only to key-wrapped ones.
///
/// # Errors
///
/// - Returns [`Error::NoIdentity`] if no usable identity was supplied
/// - Returns [`Error::WrongKey`] if none of the identities opens the file
/// - Returns [`Error::DecryptionFailed`] for corrupted or unsupported data
pub fn decrypt(data: &[u8], identities: &[Identity]) -> Result<Vec<u8>> {
    if identities.is_empty() {
        return Err(Error::NoIdentity);
    }

    if let Ok(decryptor) = age::Decryptor::new(age::armor::ArmoredReader::new(data)) {
        decrypt_with(decryptor, identities)
    } else {
        let decryptor = age::Decryptor::new(data).map_err(map_decrypt_error)?;
        decrypt_with(decryptor, identities)
    }
}

fn decrypt_with<R: Read>(decryptor: age::Decryptor<R>, identities: &[Identity]) -> Result<Vec<u8>> {
    let scrypt_identities: Vec<age::scrypt::Identity> = identities
        .iter()
        .filter_map(|identity| match identity {
            Identity::Passphrase(passphrase) => {
                Some(age::scrypt::Identity::new(passphrase.clone()))
            }
            _ => None,
        })
        .collect();

    let candidates: Vec<&dyn age::Identity> = if decryptor.is_scrypt() {
        scrypt_identities
            .iter()
            .map(|identity| identity as &dyn age::Identity)
            .collect()
    } else {
        identities
            .iter()
            .filter_map(|identity| match identity {
                Identity::Age(key) => Some(key as &dyn age::Identity),
                Identity::Ssh(key) => Some(key.as_ref() as &dyn age::Identity),
                Identity::Passphrase(_) => None,
            })
            .collect()
    };

    if candidates.is_empty() {
        return Err(Error::NoIdentity);
    }

    let mut reader = decryptor
        .decrypt(candidates.into_iter())
        .map_err(map_decrypt_error)?;
    let mut decrypted = Vec::new();
    reader.read_to_end(&mut decrypted).map_err(age_error)?;

    Ok(decrypted)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_encrypt_decrypt_with_key() {
        let identity = Identity::generate();
        let recipient = identity.to_public().unwrap();

        let encrypted = encrypt(b"token = abc", &[recipient]).unwrap();
        let decrypted = decrypt(&encrypted, &[identity]).unwrap();
        assert_eq!(decrypted, b"token = abc");
    }

    #[test]
    fn test_encrypt_no_recipients() {
        assert!(matches!(encrypt(b"data", &[]), Err(Error::NoRecipients)));
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let encrypted = encrypt(b"data", &[Identity::generate().to_public().unwrap()]).unwrap();
        let result = decrypt(&encrypted, &[Identity::generate()]);
        assert!(matches!(result, Err(Error::WrongKey)));
    }

    #[test]
    fn test_decrypt_no_identities() {
        let encrypted = encrypt(b"data", &[Identity::generate().to_public().unwrap()]).unwrap();
        assert!(matches!(decrypt(&encrypted, &[]), Err(Error::NoIdentity)));
    }

    #[test]
    fn test_passphrase_round_trip() {
        let encrypted = encrypt_with_passphrase(b"passphrase protected", "correct horse").unwrap();

        let decrypted = decrypt(&encrypted, &[Identity::from_passphrase("correct horse")]).unwrap();
        assert_eq!(decrypted, b"passphrase protected");
    }

    #[test]
    fn test_passphrase_file_ignores_key_identities() {
        let encrypted = encrypt_with_passphrase(b"data", "secret").unwrap();
        let result = decrypt(&encrypted, &[Identity::generate()]);
        assert!(matches!(result, Err(Error::NoIdentity)));
    }

    #[test]
    fn test_decrypt_garbage() {
        let result = decrypt(b"plain text, not an envelope", &[Identity::generate()]);
        assert!(result.is_err());
    }
}
