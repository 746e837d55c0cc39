//! Content deduplication of configuration payloads.

use std::collections::HashSet;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1 digest of a payload.
///
/// A dedup key only: collisions are possible and make a second, different
/// payload look already applied. Never use it for integrity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Fingerprint a payload.
    pub fn of(payload: &[u8]) -> Self {
        Self(
            payload
                .iter()
                .fold(FNV_OFFSET_BASIS, |hash, byte| {
                    hash.wrapping_mul(FNV_PRIME) ^ u64::from(*byte)
                }),
        )
    }

    /// Get the raw digest.
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Set of fingerprints of successfully applied payloads.
///
/// Checking and recording are separate steps: the caller records only after
/// a successful apply so that a failed payload stays retryable. The set only
/// grows and lives as long as its owner.
#[derive(Debug, Clone, Default)]
pub struct ContentDeduper {
    seen: HashSet<Fingerprint>,
}

impl ContentDeduper {
    /// Create an empty deduper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this payload's fingerprint was recorded.
    pub fn seen(&self, payload: &[u8]) -> bool {
        self.seen.contains(&Fingerprint::of(payload))
    }

    /// Record this payload as applied, returning its fingerprint.
    pub fn record(&mut self, payload: &[u8]) -> Fingerprint {
        let fingerprint = Fingerprint::of(payload);
        self.seen.insert(fingerprint);
        fingerprint
    }

    /// Whether a fingerprint was recorded.
    pub fn contains(&self, fingerprint: Fingerprint) -> bool {
        self.seen.contains(&fingerprint)
    }

    /// Number of recorded fingerprints.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
