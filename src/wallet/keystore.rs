// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! Local sr25519 keystore exposed as a wallet extension.
//!
//! Every key lives in its own file under `<data_dir>/keystore`. Only the
//! public key and name are stored in the clear, the seed is encrypted with a
//! key derived from the user's passphrase.

use crate::primitives::AccountId;
use crate::wallet::{Account, Signer, Sr25519Signer, WalletErr, WalletExtension};
use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, NewAead};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use log::*;
use parking_lot::RwLock;
use rand::prelude::*;
use scale::{Decode, Encode};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zeroize::Zeroize;

/// Source identifier of accounts held by the keystore.
pub const KEYSTORE_SOURCE: &str = "sustained-keystore";

const KEYSTORE_VERSION: u32 = 1;
const SEED_BYTES: usize = 32;
const KEY_FILE_EXTENSION: &str = "key";

#[derive(Encode, Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionAlgo {
    XChaCha20Poly1305,
}

/// Encrypted entry that can be serialized to bytes
#[derive(Encode, Decode, Clone, PartialEq)]
pub struct EncryptedEntry<T: Encode + Decode> {
    /// Encryption algorithm
    algo: EncryptionAlgo,

    /// Nonce
    nonce: Vec<u8>,

    /// Ciphertext
    ciphertext: Vec<u8>,

    /// Phantom
    phantom: PhantomData<T>,
}

impl<T: Encode + Decode> fmt::Debug for EncryptedEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedEntry")
            .field("algo", &self.algo)
            .field("nonce", &hex::encode(&self.nonce))
            .field("data", &"[ENCRYPTED]")
            .finish()
    }
}

impl<T: Encode + Decode> EncryptedEntry<T> {
    /// Creates an encrypted entry from data with key using XChacha20Poly1305
    pub fn xchacha20poly1305(key: &[u8; 32], data: &T) -> Result<Self, WalletErr> {
        let mut data = data.encode();
        let mut rng = rand::thread_rng();
        let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
        let nonce_bytes: [u8; 24] = rng.gen();
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, data.as_ref())
            .map_err(|_| WalletErr::Keystore("encryption failure".to_owned()));

        data.zeroize();

        Ok(EncryptedEntry {
            algo: EncryptionAlgo::XChaCha20Poly1305,
            nonce: nonce_bytes.to_vec(),
            ciphertext: ciphertext?,
            phantom: PhantomData,
        })
    }

    /// Decrypts the ciphertext using the provided key
    pub fn decrypt(&self, key: &[u8; 32]) -> Result<T, WalletErr> {
        match self.algo {
            EncryptionAlgo::XChaCha20Poly1305 => {
                if self.nonce.len() != 24 {
                    return Err(WalletErr::Keystore("corrupt nonce".to_owned()));
                }

                let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
                let mut plaintext = cipher
                    .decrypt(XNonce::from_slice(&self.nonce), self.ciphertext.as_ref())
                    .map_err(|_| WalletErr::InvalidPassphrase)?;

                let decoded = T::decode(&mut plaintext.as_slice())
                    .map_err(|_| WalletErr::Keystore("corrupt entry".to_owned()));
                plaintext.zeroize();
                decoded
            }
        }
    }
}

/// On-disk representation of one key.
#[derive(Encode, Decode, Debug, Clone, PartialEq)]
pub struct KeystoreEntry {
    pub version: u32,
    pub name: String,
    pub public: AccountId,
    pub salt: [u8; 32],
    pub seed: EncryptedEntry<[u8; SEED_BYTES]>,
}

impl KeystoreEntry {
    fn account(&self) -> Account {
        Account {
            address: self.public,
            name: Some(self.name.clone()),
            source: KEYSTORE_SOURCE.to_owned(),
        }
    }
}

/// Derives the symmetric key from a passphrase and salt.
fn passphrase_key(passphrase: &str, salt: &[u8; 32]) -> [u8; 32] {
    let mut passphrase_hash = argon2rs::argon2d_simple(passphrase, &hex::encode(salt));
    let mut key = [0; 32];
    let mut hasher = blake3::Hasher::new();
    hasher.update(&passphrase_hash);
    let mut out = hasher.finalize_xof();
    out.fill(&mut key);
    passphrase_hash.zeroize();
    key
}

pub struct KeystoreExtension {
    dir: PathBuf,
    unlocked: RwLock<HashMap<AccountId, Arc<Sr25519Signer>>>,
}

impl KeystoreExtension {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("keystore"),
            unlocked: RwLock::new(HashMap::new()),
        }
    }

    fn entry_path(&self, public: &AccountId) -> PathBuf {
        self.dir
            .join(format!("{}.{KEY_FILE_EXTENSION}", hex::encode(public.as_bytes())))
    }

    fn write_entry(&self, entry: &KeystoreEntry) -> Result<(), WalletErr> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| WalletErr::Keystore(format!("unable to create keystore: {err}")))?;
        let path = self.entry_path(&entry.public);

        if path.exists() {
            return Err(WalletErr::Keystore("key already exists".to_owned()));
        }

        fs::write(path, entry.encode())
            .map_err(|err| WalletErr::Keystore(format!("unable to write key: {err}")))
    }

    fn read_entries(&self) -> Result<Vec<KeystoreEntry>, WalletErr> {
        let dir = match fs::read_dir(&self.dir) {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(WalletErr::Keystore(err.to_string())),
        };

        let mut entries = Vec::new();
        for file in dir.flatten() {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some(KEY_FILE_EXTENSION) {
                continue;
            }

            let bytes = fs::read(&path).map_err(|err| WalletErr::Keystore(err.to_string()))?;
            match KeystoreEntry::decode(&mut bytes.as_slice()) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!("Skipping corrupt key file {}: {err}", path.display()),
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Generates a fresh key protected by `passphrase`.
    pub fn generate(&self, name: &str, passphrase: &str) -> Result<Account, WalletErr> {
        let mut seed: [u8; SEED_BYTES] = rand::thread_rng().gen();
        let result = self.import(name, &seed, passphrase);
        seed.zeroize();
        result
    }

    /// Stores an existing 32 byte seed protected by `passphrase`.
    pub fn import(
        &self,
        name: &str,
        seed: &[u8; SEED_BYTES],
        passphrase: &str,
    ) -> Result<Account, WalletErr> {
        let signer = Sr25519Signer::from_seed(seed)?;
        let salt: [u8; 32] = rand::thread_rng().gen();
        let mut key = passphrase_key(passphrase, &salt);

        let entry = KeystoreEntry {
            version: KEYSTORE_VERSION,
            name: name.to_owned(),
            public: signer.public(),
            salt,
            seed: EncryptedEntry::xchacha20poly1305(&key, seed)?,
        };
        key.zeroize();

        self.write_entry(&entry)?;
        info!("Stored key {} ({})", entry.name, entry.public);
        Ok(entry.account())
    }

    /// Public information about every stored key.
    pub fn list(&self) -> Result<Vec<Account>, WalletErr> {
        Ok(self.read_entries()?.iter().map(KeystoreEntry::account).collect())
    }

    /// Decrypts every key protected by `passphrase`. Returns how many were unlocked.
    pub fn unlock(&self, passphrase: &str) -> Result<usize, WalletErr> {
        let mut unlocked = 0;

        for entry in self.read_entries()? {
            let mut key = passphrase_key(passphrase, &entry.salt);
            let seed = entry.seed.decrypt(&key);
            key.zeroize();

            let mut seed = match seed {
                Ok(seed) => seed,
                Err(WalletErr::InvalidPassphrase) => continue,
                Err(err) => return Err(err),
            };

            let signer = Sr25519Signer::from_seed(&seed);
            seed.zeroize();
            let signer = signer?;

            if signer.public() != entry.public {
                warn!("Key file for {} holds a different key", entry.public);
                continue;
            }

            self.unlocked.write().insert(entry.public, Arc::new(signer));
            unlocked += 1;
        }

        if unlocked == 0 {
            return Err(WalletErr::InvalidPassphrase);
        }

        Ok(unlocked)
    }

    #[must_use]
    pub fn is_unlocked(&self, account: &AccountId) -> bool {
        self.unlocked.read().contains_key(account)
    }

    pub fn lock(&self) {
        self.unlocked.write().clear();
    }
}

#[async_trait]
impl WalletExtension for KeystoreExtension {
    fn id(&self) -> &str {
        KEYSTORE_SOURCE
    }

    fn name(&self) -> &str {
        "Sustained Keystore"
    }

    async fn enable(&self, app_name: &str) -> Result<(), WalletErr> {
        debug!("Keystore enabled for {app_name}");
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Account>, WalletErr> {
        self.list()
    }

    async fn signer(&self, account: &Account) -> Result<Arc<dyn Signer>, WalletErr> {
        self.unlocked
            .read()
            .get(&account.address)
            .map(|signer| signer.clone() as Arc<dyn Signer>)
            .ok_or(WalletErr::Locked)
    }
}
