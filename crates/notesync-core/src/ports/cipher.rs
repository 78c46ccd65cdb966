//! Payload encryption port
//!
//! Applied transparently around upload/download payloads when the engine
//! has a passphrase configured. A decryption failure makes the note
//! unretrievable for that pass; it is never fatal.

/// Port trait for symmetric payload encryption
pub trait IPayloadCipher: Send + Sync {
    fn encrypt(&self, data: &[u8], passphrase: &str) -> anyhow::Result<Vec<u8>>;

    fn decrypt(&self, data: &[u8], passphrase: &str) -> anyhow::Result<Vec<u8>>;
}
