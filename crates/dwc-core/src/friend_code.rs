//! Friend code derivation, display formatting and parsing.
//!
//! A friend code is a 12-digit decimal number. Its low 32 bits are the
//! profile id; the bits above carry a 7-bit checksum taken from the MD5
//! digest of the profile id (little endian) followed by the game code bytes
//! in reverse order. Legacy clients compute the same value locally, so the
//! checksum must match what they negotiated against.

use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};

/// Number of decimal digits in a friend code.
pub const DIGITS: usize = 12;

/// Digits per hyphen-separated display group.
const GROUP: usize = 4;

/// Largest value representable in [`DIGITS`] digits.
const MAX_RAW: u64 = 999_999_999_999;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FriendCodeError {
    #[error("Invalid friend code format: {0}")]
    InvalidFormat(String),
}

/// A raw friend code value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FriendCode(u64);

impl FriendCode {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Profile id carried in the low 32 bits.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn profile_id(self) -> u32 {
        self.0 as u32
    }

    /// Checksum carried above the profile id.
    pub const fn checksum(self) -> u64 {
        self.0 >> 32
    }

    /// Display form, e.g. `4982-1620-6337`.
    pub fn display(self) -> String {
        format_raw(self.0)
    }
}

impl fmt::Display for FriendCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_raw(self.0))
    }
}

impl FromStr for FriendCode {
    type Err = FriendCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s).map(Self)
    }
}

/// Format a raw value as zero-padded digit groups joined by hyphens.
pub fn format_raw(raw: u64) -> String {
    let digits = format!("{raw:0width$}", width = DIGITS);
    digits
        .as_bytes()
        .chunks(GROUP)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}

/// Strip separators and parse a displayed friend code back to its raw value.
///
/// Hyphens and spaces are separators. What remains must be exactly
/// [`DIGITS`] ASCII digits.
pub fn normalize(display: &str) -> Result<u64, FriendCodeError> {
    let digits: String = display
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();

    if digits.len() != DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FriendCodeError::InvalidFormat(display.to_string()));
    }

    digits
        .parse::<u64>()
        .ok()
        .filter(|raw| *raw <= MAX_RAW)
        .ok_or_else(|| FriendCodeError::InvalidFormat(display.to_string()))
}

/// Pick the code the checksum is computed against: the broadcast code when
/// the client supplied one, otherwise the short game id.
pub fn select_game_code<'a>(broadcast_code: Option<&'a str>, game_id: &'a str) -> &'a str {
    match broadcast_code {
        Some(code) if !code.is_empty() => code,
        _ => game_id,
    }
}

/// Friend code derivation strategy.
///
/// Implementations must be pure: identical inputs always produce identical
/// codes.
pub trait FriendCodeCodec: Send + Sync {
    fn derive(&self, profile_id: u32, game_code: &str) -> FriendCode;

    /// Whether `code` is the one this codec derives for its embedded profile
    /// id and `game_code`.
    fn verify(&self, code: FriendCode, game_code: &str) -> bool {
        self.derive(code.profile_id(), game_code) == code
    }
}

/// The MD5-checksum scheme used by DS and Wii titles.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyCodec;

impl FriendCodeCodec for LegacyCodec {
    fn derive(&self, profile_id: u32, game_code: &str) -> FriendCode {
        let mut buf = Vec::with_capacity(4 + game_code.len());
        buf.extend_from_slice(&profile_id.to_le_bytes());
        buf.extend(game_code.bytes().rev());

        let digest = Md5::digest(&buf);
        let checksum = u64::from(digest[0] >> 1);
        FriendCode((checksum << 32) | u64::from(profile_id))
    }
}
