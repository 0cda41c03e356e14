//! Read-side field decryption.
//!
//! Builders mark fields with `encrypt()`/`decrypt()`; after a read, each
//! marked string field is passed through the engine's [`FieldDecryptor`].
//! A field that fails to decrypt keeps its stored value, since columns may
//! hold a mix of plaintext and ciphertext during key rotation.

use thiserror::Error;
use tracing::debug;

use crate::value::Row;

/// Why a value could not be decrypted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("decryption failed: {0}")]
pub struct DecryptError(pub String);

impl DecryptError {
    /// Create an error with a reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Turns stored ciphertext back into plaintext.
pub trait FieldDecryptor: Send + Sync {
    /// Decrypt one stored value.
    fn decrypt(&self, ciphertext: &str) -> Result<String, DecryptError>;
}

impl<F> FieldDecryptor for F
where
    F: Fn(&str) -> Result<String, DecryptError> + Send + Sync,
{
    fn decrypt(&self, ciphertext: &str) -> Result<String, DecryptError> {
        self(ciphertext)
    }
}

/// Decrypt the marked fields of every row in place.
///
/// Only string values are touched; nulls and other JSON types pass through.
pub(crate) fn decrypt_rows(decryptor: &dyn FieldDecryptor, fields: &[String], rows: &mut [Row]) {
    if fields.is_empty() {
        return;
    }
    for row in rows.iter_mut() {
        for field in fields {
            let Some(serde_json::Value::String(stored)) = row.get_mut(field) else {
                continue;
            };
            match decryptor.decrypt(stored) {
                Ok(plain) => *stored = plain,
                Err(e) => debug!(field = %field, error = %e, "field left as stored"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reverse(s: &str) -> Result<String, DecryptError> {
        s.strip_prefix("enc:")
            .map(|body| body.chars().rev().collect())
            .ok_or_else(|| DecryptError::new("missing enc: prefix"))
    }

    #[test]
    fn test_decrypts_marked_fields_only() {
        let mut rows = vec![
            json!({"id": 1, "ssn": "enc:321", "note": "enc:x"}),
            json!({"id": 2, "ssn": "plain-text", "note": null}),
            json!({"id": 3, "ssn": null}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect::<Vec<_>>();

        decrypt_rows(&reverse, &["ssn".to_string()], &mut rows);

        assert_eq!(rows[0]["ssn"], json!("123"));
        assert_eq!(rows[0]["note"], json!("enc:x"));
        assert_eq!(rows[1]["ssn"], json!("plain-text"));
        assert_eq!(rows[2]["ssn"], json!(null));
    }
}
