//! Template-driven noid minting
//!
//! Templates follow the NOID `[prefix.]mask` convention. The first mask
//! character picks the generator (`r`, `s`, `z`), the remaining characters
//! are placeholders (`d` digit, `e`/`z` betanumeric) and an optional trailing
//! `k` appends a check character.
//!
//! The minter keeps no state and never checks for collisions. Uniqueness is
//! left to the ledger's primary key.
//!
//! ```rust,ignore
//! use dspace_aip_archiver::noid::Minter;
//!
//! let minter = Minter::new("vt.reeddk")?;
//! let noid = minter.mint();
//! ```

mod error;
mod template;

pub use error::{NoidError, Result};
pub use template::{Generator, Placeholder, Template, XDIGIT};

use rand::Rng;
use tracing::{debug, warn};

/// Below this many distinct identifiers, collisions become likely over a
/// repository's lifetime
const SMALL_KEYSPACE: u128 = 100_000;

/// Source of fresh identifiers for the resolver
pub trait Mint {
    fn mint(&self) -> String;
}

/// Mints identifiers from a validated template
#[derive(Debug, Clone)]
pub struct Minter {
    template: Template,
    source: String,
}

impl Minter {
    /// Parse the template up front so a bad one fails before any handle is touched
    pub fn new(template: &str) -> Result<Self> {
        let parsed = Template::parse(template)?;
        let capacity = parsed.capacity();
        if capacity < SMALL_KEYSPACE {
            warn!(template, capacity, "Noid template has a small keyspace");
        }
        debug!(template, generator = ?parsed.generator, capacity, "Minter ready");

        Ok(Self {
            template: parsed,
            source: template.to_string(),
        })
    }

    /// Distinct identifiers this minter can produce
    pub fn capacity(&self) -> u128 {
        self.template.capacity()
    }

    pub fn template(&self) -> &str {
        &self.source
    }

    /// Mint a fresh identifier using the thread-local RNG
    pub fn mint(&self) -> String {
        self.mint_with(&mut rand::thread_rng())
    }

    /// Mint with a caller-supplied RNG (tests use a seeded one)
    pub fn mint_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        // All generators draw from the random source; sequence state would
        // need a counter the minter intentionally does not own.
        let mut id = String::with_capacity(self.template.prefix.len() + 1 + 16);
        id.push_str(&self.template.prefix);

        for placeholder in &self.template.placeholders {
            let alphabet = placeholder.alphabet();
            let idx = rng.gen_range(0..alphabet.len());
            id.push(alphabet[idx] as char);
        }

        if self.template.check_char {
            let check = check_char(&id);
            id.push(check);
        }

        id
    }
}

impl Mint for Minter {
    fn mint(&self) -> String {
        Minter::mint(self)
    }
}

/// Convenience wrapper: parse and mint in one call
pub fn mint(template: &str) -> Result<String> {
    Ok(Minter::new(template)?.mint())
}

/// NOID check character: weighted ordinal sum modulo 29
pub fn check_char(id: &str) -> char {
    let sum: usize = id
        .bytes()
        .enumerate()
        .map(|(pos, b)| ordinal(b) * (pos + 1))
        .sum();
    XDIGIT[sum % XDIGIT.len()] as char
}

/// Whether the last character of `id` is a valid check character for the rest
pub fn verify_check_char(id: &str) -> bool {
    match id.char_indices().last() {
        Some((idx, last)) if idx > 0 => check_char(&id[..idx]) == last,
        _ => false,
    }
}

fn ordinal(b: u8) -> usize {
    XDIGIT.iter().position(|&c| c == b).unwrap_or(0)
}
