use std::{fmt::Display, str::FromStr};

use data_encoding::{BASE64URL_NOPAD, HEXLOWER};
use rand::{rngs::OsRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CODE_LENGTH: usize = 6;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// A six-digit one-time passcode, only ever sent by email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code(u32);

impl Code {
    /// Generate a random code, uniform over all six-digit numbers.
    pub fn random() -> Self {
        Self(OsRng.gen_range(CODE_MIN..=CODE_MAX))
    }
}

impl Display for Code {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{:06}", self.0)
    }
}

impl FromStr for Code {
    type Err = ParseError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let len = string.chars().count();
        if len != CODE_LENGTH {
            return Err(Self::Err::InvalidLength(len));
        }
        if let Some(c) = string.chars().find(|c| !c.is_ascii_digit()) {
            return Err(Self::Err::InvalidChar(c));
        }
        // Six ASCII digits always fit in a u32.
        string
            .parse::<u32>()
            .map(Self)
            .map_err(|_| Self::Err::InvalidLength(len))
    }
}

impl TryFrom<String> for Code {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.to_string()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("code must contain exactly 6 characters")]
    InvalidLength(usize),
    #[error("code must contain only digits")]
    InvalidChar(char),
}

/// The public handle for a pending code, returned to the client in place of
/// the code itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortCode(String);

impl ShortCode {
    const BYTES: usize = 16;

    pub fn random() -> Self {
        let mut bytes = [0_u8; Self::BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(BASE64URL_NOPAD.encode(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A long-lived secret mailed to a nominee so they can later withdraw.
pub fn random_withdrawal_token() -> String {
    let mut bytes = [0_u8; 32];
    OsRng.fill_bytes(&mut bytes);
    HEXLOWER.encode(&bytes)
}
