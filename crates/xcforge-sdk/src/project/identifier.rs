//! Object identifiers.
//!
//! Every record in a project file is keyed by a 24 character hexadecimal
//! string. New identifiers are drawn at random and checked against the keys
//! already present in the registry.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{Result, XcError};

/// Length of an identifier in characters.
pub const IDENTIFIER_LEN: usize = 24;

/// Maximum number of candidates drawn before giving up.
pub const MAX_ATTEMPTS: usize = 10;

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// A 24 character hexadecimal key naming one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Wraps a string that has the identifier shape.
    ///
    /// Returns `None` when `value` is not exactly 24 hex characters.
    pub fn parse(value: &str) -> Option<Self> {
        is_identifier(value).then(|| Identifier(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Structural check: exactly 24 hexadecimal characters, any case.
///
/// This is the only thing that separates a pointer from plain data in a
/// project file, so a string value that happens to be 24 hex digits will be
/// treated as a reference by navigation helpers.
pub fn is_identifier(value: &str) -> bool {
    value.len() == IDENTIFIER_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Draws random uppercase identifiers that avoid a set of existing keys.
pub struct IdentifierGenerator {
    rng: StdRng,
}

impl IdentifierGenerator {
    /// Creates a generator seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Creates a deterministic generator, mostly useful in tests.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn candidate(&mut self) -> Identifier {
        let token: String = (0..IDENTIFIER_LEN)
            .map(|_| HEX_UPPER[self.rng.random_range(0..16)] as char)
            .collect();
        Identifier(token)
    }

    /// Returns a fresh identifier for which `taken` is false.
    ///
    /// # Errors
    ///
    /// Returns [`XcError::GenerationExhausted`] after [`MAX_ATTEMPTS`]
    /// consecutive collisions.
    pub fn generate<F>(&mut self, taken: F) -> Result<Identifier>
    where
        F: Fn(&str) -> bool,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let candidate = self.candidate();
            if !taken(candidate.as_str()) {
                return Ok(candidate);
            }
            tracing::warn!(attempt, id = %candidate, "identifier collision");
        }
        Err(XcError::GenerationExhausted {
            attempts: MAX_ATTEMPTS,
        })
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdentifierGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierGenerator").finish_non_exhaustive()
    }
}
