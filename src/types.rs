use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Unique key of a risk within a register.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskId(pub String);

impl RiskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// FNV-1a over the id bytes. Stable across platforms and releases, unlike
    /// `DefaultHasher`, so it can key a reproducible RNG stream.
    pub fn stream_key(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        self.0
            .bytes()
            .fold(OFFSET, |h, b| (h ^ b as u64).wrapping_mul(PRIME))
    }
}

impl fmt::Display for RiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RiskId {
    fn from(s: &str) -> Self {
        RiskId(s.to_string())
    }
}

impl From<String> for RiskId {
    fn from(s: String) -> Self {
        RiskId(s)
    }
}

/// Simulated annual losses, one entry per trial. Index `i` is trial `i`.
///
/// Read-only once built: the engine hands these out and every consumer only
/// borrows the slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LossVector(Box<[f64]>);

impl LossVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0.into_vec()
    }
}

impl Deref for LossVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for LossVector {
    fn from(v: Vec<f64>) -> Self {
        LossVector(v.into_boxed_slice())
    }
}

impl FromIterator<f64> for LossVector {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        LossVector(iter.into_iter().collect())
    }
}

impl AsRef<[f64]> for LossVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_key_is_stable() {
        // Reference values for FNV-1a 64.
        assert_eq!(RiskId::from("").stream_key(), 0xcbf2_9ce4_8422_2325);
        assert_eq!(RiskId::from("a").stream_key(), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn stream_key_differs_between_ids() {
        assert_ne!(RiskId::from("R1").stream_key(), RiskId::from("R2").stream_key());
    }

    #[test]
    fn loss_vector_derefs_to_slice() {
        let v = LossVector::from(vec![1.0, 2.0, 3.0]);
        assert_eq!(v.len(), 3);
        assert_eq!(v.iter().sum::<f64>(), 6.0);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);
    }
}
