//! Reference `Crypto` implementation
//!
//! Used for tests and as a drop-in default for deployments that don't need a
//! hardware-backed key store. `Ed25519` keys are converted to their
//! `X25519` (Montgomery) form for ECDH, `AES-128` runs in raw ECB block mode
//! (the protocol's addressed-payload framing, not general-purpose
//! confidentiality), and the ack hash folds a CMAC tag down to 32 bits.

use aes::Aes128;
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray};
use cmac::{Cmac, Mac};
use curve25519_dalek::edwards::CompressedEdwardsY;

use crate::room::traits::{Crypto, CryptoError};

/// `AES-128` block size in bytes.
const BLOCK_SIZE: usize = 16;

/// Reference implementation of [`Crypto`] over `x25519-dalek`/`aes`/`cmac`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCrypto;

impl DefaultCrypto {
    /// Build the default reference crypto provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn cmac_tag(key: &[u8; 32], data: &[u8]) -> Result<[u8; 16], CryptoError> {
        let aes_key: [u8; 16] = key[..16].try_into().map_err(|_| CryptoError::InvalidKey)?;
        let mut mac = Cmac::<Aes128>::new_from_slice(&aes_key).map_err(|_| CryptoError::InvalidKey)?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().into())
    }
}

impl Crypto for DefaultCrypto {
    fn ed25519_public_to_x25519(&self, ed25519_public: &[u8; 32]) -> Result<[u8; 32], CryptoError> {
        CompressedEdwardsY(*ed25519_public)
            .decompress()
            .map(|point| point.to_montgomery().to_bytes())
            .ok_or(CryptoError::InvalidKey)
    }

    fn derive_shared_secret(
        &self,
        our_secret_x25519: &[u8; 32],
        their_public_x25519: &[u8; 32],
    ) -> Result<[u8; 32], CryptoError> {
        let secret = x25519_dalek::StaticSecret::from(*our_secret_x25519);
        let public = x25519_dalek::PublicKey::from(*their_public_x25519);
        let shared = secret.diffie_hellman(&public);
        if shared.as_bytes() == &[0u8; 32] {
            return Err(CryptoError::InvalidKey);
        }
        Ok(*shared.as_bytes())
    }

    fn aes128_open(&self, key: &[u8; 32], mac: u16, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let tag = Self::cmac_tag(key, ciphertext)?;
        let expected_mac = u16::from_be_bytes([tag[0], tag[1]]);
        if expected_mac != mac {
            return Err(CryptoError::DecryptFailed);
        }
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::DecryptFailed);
        }
        let aes_key: [u8; 16] = key[..16].try_into().map_err(|_| CryptoError::InvalidKey)?;
        let cipher = Aes128::new(GenericArray::from_slice(&aes_key));
        let mut plaintext = ciphertext.to_vec();
        for chunk in plaintext.chunks_mut(BLOCK_SIZE) {
            cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
        }
        Ok(plaintext)
    }

    fn aes128_seal(&self, key: &[u8; 32], plaintext: &[u8]) -> (u16, Vec<u8>) {
        let aes_key: [u8; 16] = key[..16].try_into().unwrap_or([0u8; 16]);
        let cipher = Aes128::new(GenericArray::from_slice(&aes_key));
        let mut padded = plaintext.to_vec();
        let remainder = padded.len() % BLOCK_SIZE;
        if remainder != 0 {
            padded.resize(padded.len() + (BLOCK_SIZE - remainder), 0);
        }
        for chunk in padded.chunks_mut(BLOCK_SIZE) {
            cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
        }
        let tag = Self::cmac_tag(key, &padded).unwrap_or([0u8; 16]);
        (u16::from_be_bytes([tag[0], tag[1]]), padded)
    }

    fn ack_hash(&self, trimmed_plaintext: &[u8], sender_pubkey: &[u8; 32]) -> u32 {
        let aes_key: [u8; 16] = sender_pubkey[..16].try_into().unwrap_or([0u8; 16]);
        let Ok(mut mac) = Cmac::<Aes128>::new_from_slice(&aes_key) else {
            return 0;
        };
        mac.update(trimmed_plaintext);
        let tag = mac.finalize().into_bytes();
        u32::from_be_bytes([tag[0], tag[1], tag[2], tag[3]])
    }

    fn anon_open(
        &self,
        our_secret_x25519: &[u8; 32],
        ephemeral_public: &[u8; 32],
        mac: u16,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        // The sender's "ephemeral" key is its persistent Ed25519 identity, reused
        // across logins; convert it the same way ContactStore::shared_secret does
        // so both derivations land on the same session secret.
        let their_x25519 = self.ed25519_public_to_x25519(ephemeral_public)?;
        let secret = self.derive_shared_secret(our_secret_x25519, &their_x25519)?;
        self.aes128_open(&secret, mac, ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand_core::OsRng;

    #[test]
    fn ecdh_is_symmetric() {
        let crypto = DefaultCrypto::new();
        let a = x25519_dalek::StaticSecret::random_from_rng(OsRng);
        let b = x25519_dalek::StaticSecret::random_from_rng(OsRng);
        let a_pub = x25519_dalek::PublicKey::from(&a);
        let b_pub = x25519_dalek::PublicKey::from(&b);

        let secret_ab = crypto
            .derive_shared_secret(a.to_bytes().as_ref().try_into().unwrap(), b_pub.as_bytes())
            .unwrap();
        let secret_ba = crypto
            .derive_shared_secret(b.to_bytes().as_ref().try_into().unwrap(), a_pub.as_bytes())
            .unwrap();
        assert_eq!(secret_ab, secret_ba);
    }

    #[test]
    fn ed25519_to_x25519_round_trips_through_decompression() {
        let crypto = DefaultCrypto::new();
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying = signing_key.verifying_key();
        assert!(crypto.ed25519_public_to_x25519(verifying.as_bytes()).is_ok());
    }

    #[test]
    fn seal_then_open_round_trips() {
        let crypto = DefaultCrypto::new();
        let key = [7u8; 32];
        let plaintext = b"hello mesh".to_vec();
        let (mac, ciphertext) = crypto.aes128_seal(&key, &plaintext);
        let opened = crypto.aes128_open(&key, mac, &ciphertext).unwrap();
        assert_eq!(&opened[..plaintext.len()], plaintext.as_slice());
    }

    #[test]
    fn open_rejects_bad_mac() {
        let crypto = DefaultCrypto::new();
        let key = [7u8; 32];
        let (_mac, ciphertext) = crypto.aes128_seal(&key, b"hello");
        assert!(crypto.aes128_open(&key, 0xFFFF, &ciphertext).is_err());
    }
}
