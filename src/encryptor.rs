//! Pluggable payload encryption.
//!
//! An [`Encryptor`] is identified by a single byte. When a connection has at least one encryptor,
//! every non-empty Text/Binary payload travels as `[id][ciphertext...]`, and the receiving side
//! uses the first byte to pick the encryptor that decrypts the rest.
//!
//! The server holds one registry as a template. Each accepted connection receives its own deep
//! copy, so encryptors are free to keep mutable per-connection state (counters, nonces, session
//! keys) without leaking it into other connections.
use crate::error::Error;
use std::collections::BTreeMap;
use std::fmt;

pub trait Encryptor: Send + Sync {
    /// Identifier byte written in front of every payload this encryptor produces.
    fn id(&self) -> u8;

    /// Encrypts a plaintext payload, the identifier byte is not included in the output.
    fn encrypt(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error>;

    /// Decrypts a payload that already had its identifier byte stripped.
    fn decrypt(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error>;

    /// Produces an independent copy, used when the registry template is cloned for a new
    /// connection.
    fn box_clone(&self) -> Box<dyn Encryptor>;
}

impl Clone for Box<dyn Encryptor> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

#[derive(Clone, Default)]
pub struct EncryptorRegistry {
    encryptors: BTreeMap<u8, Box<dyn Encryptor>>,
}

impl EncryptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Registering only happens while the server template is being built, once
    // the server starts the template is never touched again, only cloned
    pub fn register<E: Encryptor + 'static>(&mut self, encryptor: E) -> Result<(), Error> {
        let id = encryptor.id();
        if self.encryptors.contains_key(&id) {
            return Err(Error::DuplicateEncryptor(id));
        }
        self.encryptors.insert(id, Box::new(encryptor));
        Ok(())
    }

    pub fn with<E: Encryptor + 'static>(mut self, encryptor: E) -> Result<Self, Error> {
        self.register(encryptor)?;
        Ok(self)
    }

    pub fn has_any(&self) -> bool {
        !self.encryptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.encryptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encryptors.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.encryptors.keys().copied()
    }

    pub fn lookup(&mut self, id: u8) -> Result<&mut (dyn Encryptor + 'static), Error> {
        self.encryptors
            .get_mut(&id)
            .map(|encryptor| &mut **encryptor)
            .ok_or(Error::EncryptorNotFound(id))
    }

    /// Takes a wire payload `[id][ciphertext...]` and returns the plaintext.
    /// An unknown id means the stream is corrupted, and it's reported as an error.
    pub fn decrypt_payload(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        match payload.split_first() {
            Some((id, ciphertext)) => self.lookup(*id)?.decrypt(ciphertext),
            None => Ok(Vec::new()),
        }
    }

    /// Encrypts with the encryptor `id`, returning the wire payload `[id][ciphertext...]`.
    pub fn encrypt_payload(&mut self, id: u8, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let ciphertext = self.lookup(id)?.encrypt(payload)?;

        let mut wire = Vec::with_capacity(ciphertext.len() + 1);
        wire.push(id);
        wire.extend_from_slice(&ciphertext);
        Ok(wire)
    }
}

impl fmt::Debug for EncryptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptorRegistry")
            .field("ids", &self.encryptors.keys().collect::<Vec<_>>())
            .finish()
    }
}
