//! Key derivation and signing for xpla accounts.
//!
//! The chain uses Ethereum-style keys: coin type 60, keccak-160 addresses
//! bech32-encoded with the `xpla` prefix, and keccak-256 sign-doc hashing.

use std::fmt::Display;
use std::str::FromStr;

use bech32::{ToBase32, Variant};
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::util::bip32::{DerivationPath, ExtendedPrivKey, ExtendedPubKey};
use hkd32::mnemonic::Phrase;
use once_cell::sync::OnceCell;
use tiny_keccak::{Hasher, Keccak};

use crate::error::WalletError;

/// Bech32 human-readable part for chain addresses.
pub const ADDRESS_HRP: &str = "xpla";

/// BIP-44 path for the chain's Ethereum-compatible accounts.
const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// A seed phrase for a wallet
#[derive(Clone)]
pub struct SeedPhrase {
    phrase: Phrase,
}

impl SeedPhrase {
    /// Generate a random seed phrase
    pub fn random() -> SeedPhrase {
        let mut rng = rand::thread_rng();
        SeedPhrase {
            phrase: Phrase::random(&mut rng, Default::default()),
        }
    }

    /// The phrase itself
    pub fn phrase(&self) -> &str {
        self.phrase.phrase()
    }
}

impl FromStr for SeedPhrase {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phrase::new(s, Default::default())
            .map(|phrase| SeedPhrase { phrase })
            .map_err(|_| WalletError::InvalidPhrase)
    }
}

/// A wallet capable of signing for a chain account
#[derive(Clone)]
pub struct Wallet {
    address: String,
    eth_address: [u8; 20],
    privkey: ExtendedPrivKey,
    public_key_bytes: Vec<u8>,
}

fn global_secp() -> &'static Secp256k1<All> {
    static CELL: OnceCell<Secp256k1<All>> = OnceCell::new();
    CELL.get_or_init(Secp256k1::new)
}

impl Wallet {
    /// Derive a wallet from a seed phrase at the default derivation path.
    pub fn from_phrase(phrase: &str) -> Result<Wallet, WalletError> {
        let seed_phrase = SeedPhrase::from_str(phrase)?;
        Wallet::from_seed_phrase(&seed_phrase, DEFAULT_DERIVATION_PATH)
    }

    /// Derive a wallet from a seed phrase at the given derivation path.
    pub fn from_seed_phrase(
        seed_phrase: &SeedPhrase,
        derivation_path: &str,
    ) -> Result<Wallet, WalletError> {
        let secp = global_secp();
        let path: DerivationPath =
            derivation_path
                .parse()
                .map_err(|source| WalletError::InvalidDerivationPath {
                    path: derivation_path.to_owned(),
                    source,
                })?;

        let root = ExtendedPrivKey::new_master(
            bitcoin::Network::Bitcoin,
            seed_phrase.phrase.to_seed("").as_bytes(),
        )
        .map_err(|source| WalletError::Derivation { source })?;
        let privkey = root
            .derive_priv(secp, &path)
            .map_err(|source| WalletError::Derivation { source })?;
        let public_key = ExtendedPubKey::from_priv(secp, &privkey);

        let eth_address = eth_address_from_public_key(&public_key.public_key.serialize_uncompressed());
        let address = bech32::encode(ADDRESS_HRP, eth_address.to_base32(), Variant::Bech32)
            .expect("bech32 encoding of a 20-byte hash cannot fail");

        Ok(Wallet {
            address,
            eth_address,
            privkey,
            public_key_bytes: public_key.public_key.serialize().to_vec(),
        })
    }

    /// Generate a random wallet
    pub fn generate() -> Wallet {
        Wallet::from_seed_phrase(&SeedPhrase::random(), DEFAULT_DERIVATION_PATH)
            .expect("default derivation path is valid")
    }

    /// The bech32 account address, e.g. `xpla1...`
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The same account as a 0x-prefixed Ethereum address
    pub fn eth_address(&self) -> String {
        format!("0x{}", hex::encode(self.eth_address))
    }

    /// Compressed secp256k1 public key bytes
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key_bytes
    }

    /// Sign arbitrary bytes with the account key.
    ///
    /// eth_secp256k1 hashes the sign doc with keccak-256, not sha256.
    pub fn sign_bytes(&self, msg: &[u8]) -> Signature {
        let hash = keccak256(msg);
        let msg = Message::from_slice(&hash).expect("keccak256 output is 32 bytes");
        global_secp().sign_ecdsa(&msg, &self.privkey.private_key)
    }
}

impl Display for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Last 20 bytes of keccak256 over the uncompressed public key, skipping the
/// 0x04 prefix byte.
fn eth_address_from_public_key(public_key: &[u8; 65]) -> [u8; 20] {
    let hash = keccak256(&public_key[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn derivation_is_deterministic() {
        let a = Wallet::from_phrase(TEST_PHRASE).unwrap();
        let b = Wallet::from_phrase(TEST_PHRASE).unwrap();
        assert_eq!(a.address(), b.address());
        assert_eq!(a.public_key_bytes(), b.public_key_bytes());
    }

    #[test]
    fn address_shape() {
        let wallet = Wallet::from_phrase(TEST_PHRASE).unwrap();
        assert!(wallet.address().starts_with("xpla1"));
        let (hrp, data, _) = bech32::decode(wallet.address()).unwrap();
        assert_eq!(hrp, ADDRESS_HRP);
        let bytes: Vec<u8> = bech32::FromBase32::from_base32(&data).unwrap();
        assert_eq!(bytes.len(), 20);
        assert!(wallet.eth_address().starts_with("0x"));
        assert_eq!(wallet.eth_address().len(), 42);
    }

    #[test]
    fn bad_phrase_is_rejected() {
        assert!(Wallet::from_phrase("definitely not a mnemonic").is_err());
    }

    #[test]
    fn signatures_are_compact() {
        let wallet = Wallet::generate();
        let sig = wallet.sign_bytes(b"sign doc bytes");
        assert_eq!(sig.serialize_compact().len(), 64);
    }
}
