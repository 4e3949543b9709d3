//! Authentication token shared between a host and its clients
//!
//! The host generates one 256-bit token at startup and hands it to clients
//! through [`ConnectInfo`](crate::types::ConnectInfo). Every connection must
//! present it in `Hello` before any send-text request is accepted.

use crate::error::CoreError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Token size in bytes (256-bit)
const TOKEN_SIZE: usize = 32;

/// Authentication token
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthToken([u8; TOKEN_SIZE]);

impl AuthToken {
    /// Generate a new random token
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_SIZE];
        rand::thread_rng().fill(&mut bytes);
        Self(bytes)
    }

    /// Parse a 64-character hex string
    pub fn from_hex(hex: &str) -> Result<Self, CoreError> {
        if hex.len() != TOKEN_SIZE * 2 || !hex.is_ascii() {
            return Err(CoreError::InvalidTokenFormat);
        }

        let mut bytes = [0u8; TOKEN_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| CoreError::InvalidTokenFormat)?;
        }
        Ok(Self(bytes))
    }

    /// Lowercase hex, 64 characters
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Compare without an early exit on the first differing byte
    pub fn verify(&self, presented: &AuthToken) -> bool {
        self.0
            .iter()
            .zip(presented.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret
        write!(f, "AuthToken({}…)", &self.to_hex()[..6])
    }
}

impl FromStr for AuthToken {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}
