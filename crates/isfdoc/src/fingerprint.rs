//! Content fingerprints for shader sources and derived cache identifiers.
//!
//! Two independently seeded 64-bit FNV-1a streams are fed the same byte
//! sequence, giving a 128-bit identifier with a collision probability low
//! enough to treat equal fingerprints as equal content. The writer is kept
//! public so downstream crates can fingerprint structured data (e.g. a render
//! request) with the same scheme.

use std::fmt;

const SEED_A: u64 = 0xcbf29ce484222325;
const SEED_B: u64 = 0x9ae16a3b2f90404f;
const FNV_PRIME: u64 = 0x100000001b3;

/// 128-bit identity derived from hashed content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub hi: u64,
    pub lo: u64,
}

impl Fingerprint {
    /// Fingerprints a shader source verbatim, byte for byte.
    pub fn of_source(source: &str) -> Self {
        let mut writer = FingerprintWriter::new();
        writer.write_bytes(source.as_bytes());
        writer.finish()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.hi, self.lo)
    }
}

/// Incremental fingerprint construction over structured data.
///
/// Length-prefix variable-sized fields (see [`FingerprintWriter::write_str`])
/// so adjacent fields cannot alias each other.
pub struct FingerprintWriter {
    a: Fnv1a64,
    b: Fnv1a64,
}

impl FingerprintWriter {
    pub fn new() -> Self {
        Self {
            a: Fnv1a64(SEED_A),
            b: Fnv1a64(SEED_B),
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.a.write(bytes);
        self.b.write(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Writes a float by exact bit pattern; no rounding or formatting is
    /// involved, so -0.0 and 0.0 fingerprint differently.
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_u64(value.len() as u64);
        self.write_bytes(value.as_bytes());
    }

    pub fn finish(self) -> Fingerprint {
        Fingerprint {
            hi: self.a.0,
            lo: self.b.0,
        }
    }
}

impl Default for FingerprintWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
struct Fnv1a64(u64);

impl Fnv1a64 {
    fn write(&mut self, bytes: &[u8]) {
        let mut h = self.0;
        for &b in bytes {
            h ^= b as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        self.0 = h;
    }
}
