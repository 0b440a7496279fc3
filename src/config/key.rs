use cosmrs::bip32;
use cosmrs::crypto::{secp256k1, PublicKey};
use cosmrs::tx::{Raw, SignDoc};
use cosmrs::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::client::error::ClientError;

// https://github.com/confio/cosmos-hd-key-derivation-spec#the-cosmos-hub-path
const DERIVATION_PATH: &str = "m/44'/118'/0'/0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningKey {
    /// human readable key name
    pub name: String,
    /// where the seed phrase associated with `name` comes from
    pub key: Key,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// Mnemonic allows you to pass the private key mnemonic words
    /// directly for configuring a transaction signing key.
    /// DO NOT USE FOR MAINNET
    Mnemonic(String),
    /// Name of the environment variable the mnemonic is read from.
    Env(String),
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Key::Mnemonic(_) => write!(f, "Mnemonic(<redacted>)"),
            Key::Env(var) => write!(f, "Env({:?})", var),
        }
    }
}

impl SigningKey {
    pub fn phrase(&self) -> Result<String, ClientError> {
        match &self.key {
            Key::Mnemonic(words) => Ok(words.clone()),
            Key::Env(var) => {
                std::env::var(var).map_err(|_| ClientError::MissingSeedEnv { var: var.clone() })
            }
        }
    }

    /// Derives the signing identity for `prefix`, keeping `name` as its label.
    pub fn to_identity(&self, prefix: &str) -> Result<Identity, ClientError> {
        let mut identity = Identity::resolve(&self.phrase()?, prefix)?;
        identity.name = self.name.clone();
        Ok(identity)
    }
}

/// A derived signing key and its bech32 address.
///
/// The seed phrase is dropped once the key is derived. Cloning is cheap,
/// the extended private key is shared. A signer is only built for the
/// duration of a [Identity::sign] call.
#[derive(Clone)]
pub struct Identity {
    name: String,
    account_id: AccountId,
    public_key: PublicKey,
    key: Arc<bip32::XPrv>,
}

impl Identity {
    /// Derives the first account (`m/44'/118'/0'/0/0`) of `seed_phrase`.
    ///
    /// Same phrase and prefix always yield the same address.
    pub fn resolve(seed_phrase: &str, address_prefix: &str) -> Result<Self, ClientError> {
        Self::resolve_hd(seed_phrase, address_prefix, 0)
    }

    /// Derives account `index` of `seed_phrase`, useful for fanning out test wallets
    /// from a single phrase.
    ///
    /// Accepts any BIP39 english phrase of 12, 15, 18, 21 or 24 words.
    pub fn resolve_hd(
        seed_phrase: &str,
        address_prefix: &str,
        index: u32,
    ) -> Result<Self, ClientError> {
        let words = seed_phrase.split_whitespace().collect::<Vec<_>>().join(" ");
        let seed = bip39::Mnemonic::parse_in_normalized(bip39::Language::English, &words)
            .map_err(|_| ClientError::InvalidSeedPhrase)?
            .to_seed_normalized("");

        let path = format!("{}/{}", DERIVATION_PATH, index)
            .parse()
            .map_err(|_| ClientError::DerivationPath)?;
        let key = bip32::XPrv::derive_from_path(seed, &path)
            .map_err(|_| ClientError::DerivationPath)?;

        let public_key = secp256k1::SigningKey::from(&key).public_key();
        let account_id =
            public_key
                .account_id(address_prefix)
                .map_err(|_| ClientError::AccountPrefix {
                    prefix: address_prefix.to_string(),
                })?;

        Ok(Self {
            name: account_id.to_string(),
            account_id,
            public_key,
            key: Arc::new(key),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> String {
        self.account_id.to_string()
    }

    pub fn prefix(&self) -> String {
        self.account_id.prefix().to_string()
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Signs `doc` with this identity's key.
    pub(crate) fn sign(&self, doc: SignDoc) -> Result<Raw, ClientError> {
        let key = secp256k1::SigningKey::from(self.key.as_ref());
        doc.sign(&key).map_err(ClientError::crypto)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Identity")
            .field("name", &self.name)
            .field("address", &self.account_id.to_string())
            .finish()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.name == self.account_id.as_ref() {
            write!(f, "{}", self.account_id)
        } else {
            write!(f, "{} ({})", self.name, self.account_id)
        }
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.account_id == other.account_id
    }
}

impl Eq for Identity {}
