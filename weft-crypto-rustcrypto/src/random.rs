//! Operating-system randomness through `rand`'s `OsRng`.

use rand::rngs::OsRng;
use rand::RngCore;
use weft_crypto::{Error, Random, Result};

/// CSPRNG backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl Random for OsRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|_| Error::RandomGenerationFailed)
    }
}
