//! 64-bit SimHash over word shingles, with a banded index for near-duplicate lookup

use super::hash::feature_hash;
use std::collections::HashMap;

const SHINGLE: usize = 3;
const BANDS: usize = 4;
/// Largest distance for which four 16-bit bands are guaranteed to share one band
const BANDED_DISTANCE: u32 = (BANDS - 1) as u32;

/// Locality-sensitive fingerprint of `text`; 0 for text without words
pub fn simhash(text: &str) -> u64 {
    let words: Vec<String> = text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return 0;
    }

    let features: Vec<String> = if words.len() < SHINGLE {
        words
    } else {
        words.windows(SHINGLE).map(|w| w.join(" ")).collect()
    };

    let mut weights = [0i32; 64];
    for feature in &features {
        let h = feature_hash(feature);
        for (bit, weight) in weights.iter_mut().enumerate() {
            if h >> bit & 1 == 1 {
                *weight += 1;
            } else {
                *weight -= 1;
            }
        }
    }
    weights
        .iter()
        .enumerate()
        .filter(|(_, w)| **w > 0)
        .fold(0u64, |acc, (bit, _)| acc | 1 << bit)
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

fn band(fingerprint: u64, n: usize) -> u16 {
    (fingerprint >> (n * 16)) as u16
}

/// Fingerprints seen so far, keyed by the content hash of their chunk
#[derive(Debug, Default)]
pub struct SimHashIndex {
    entries: Vec<(u64, String)>,
    bands: [HashMap<u16, Vec<usize>>; BANDS],
}

impl SimHashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, fingerprint: u64, content_hash: String) {
        let id = self.entries.len();
        self.entries.push((fingerprint, content_hash));
        for (n, table) in self.bands.iter_mut().enumerate() {
            table.entry(band(fingerprint, n)).or_default().push(id);
        }
    }

    /// Content hash of the earliest entry within `max_distance` of `fingerprint`
    pub fn find(&self, fingerprint: u64, max_distance: u32) -> Option<&str> {
        let within = |id: &usize| hamming_distance(self.entries[*id].0, fingerprint) <= max_distance;

        let found = if max_distance <= BANDED_DISTANCE {
            self.bands
                .iter()
                .enumerate()
                .filter_map(|(n, table)| table.get(&band(fingerprint, n)))
                .flatten()
                .filter(|id| within(*id))
                .min()
                .copied()
        } else {
            (0..self.entries.len()).find(within)
        };
        found.map(|id| self.entries[id].1.as_str())
    }
}
