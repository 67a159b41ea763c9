// Copyright (C) 2025 Joseph Sacchini
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("secure random source failed: {0}")]
    Entropy(#[source] rand::Error),
}

/// Source of secret bytes for keys and pre-shared keys.
pub trait Entropy: Send + Sync + 'static {
    fn fill(&self, buf: &mut [u8; 32]) -> Result<(), KeyError>;
}

/// The operating system's CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl Entropy for OsEntropy {
    fn fill(&self, buf: &mut [u8; 32]) -> Result<(), KeyError> {
        OsRng.try_fill_bytes(buf).map_err(KeyError::Entropy)
    }
}

/// Base64 encoded x25519 key pair, as wg-quick expects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub private_key: String,
    pub public_key: String,
}

pub fn generate_keypair(entropy: &dyn Entropy) -> Result<KeyPair, KeyError> {
    let mut bytes = [0u8; 32];
    entropy.fill(&mut bytes)?;

    // clamp like `wg genkey` so the stored key is already a valid scalar
    bytes[0] &= 248;
    bytes[31] &= 127;
    bytes[31] |= 64;

    let secret = StaticSecret::from(bytes);
    let public = PublicKey::from(&secret);

    Ok(KeyPair {
        private_key: BASE64.encode(secret.to_bytes()),
        public_key: BASE64.encode(public.as_bytes()),
    })
}

pub fn generate_psk(entropy: &dyn Entropy) -> Result<String, KeyError> {
    let mut bytes = [0u8; 32];
    entropy.fill(&mut bytes)?;
    Ok(BASE64.encode(bytes))
}


#[cfg(test)]
mod tests {
    use super::testing::{BrokenEntropy, CountingEntropy};
    use super::*;

    fn decode(b64: &str) -> [u8; 32] {
        BASE64.decode(b64).unwrap().try_into().unwrap()
    }

    #[test]
    fn keypair_is_consistent() {
        let pair = generate_keypair(&OsEntropy).unwrap();
        assert_eq!(pair.private_key.len(), 44);
        assert_eq!(pair.public_key.len(), 44);

        let secret = StaticSecret::from(decode(&pair.private_key));
        let public = PublicKey::from(&secret);
        assert_eq!(public.as_bytes(), &decode(&pair.public_key));
    }

    #[test]
    fn private_key_is_clamped() {
        let pair = generate_keypair(&CountingEntropy::default()).unwrap();
        let private = decode(&pair.private_key);
        assert_eq!(private[0] & 7, 0);
        assert_eq!(private[31] & 0xc0, 0x40);
    }

    #[test]
    fn psk_is_256_bits() {
        let psk = generate_psk(&OsEntropy).unwrap();
        assert_eq!(decode(&psk).len(), 32);
        assert_ne!(psk, generate_psk(&OsEntropy).unwrap());
    }

    #[test]
    fn entropy_failure_propagates() {
        assert!(generate_keypair(&BrokenEntropy).is_err());
        assert!(generate_psk(&BrokenEntropy).is_err());
    }
}
