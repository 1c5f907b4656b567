// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Query Signatures
//!
//! A [`QuerySignature`] is the stable key of the learning store: the hex
//! SHA-256 of the normalized query text. Normalization lowercases, strips
//! punctuation and collapses whitespace, so `"Fix the  failing test!"` and
//! `"fix the failing test"` share one signature.
//!
//! [`SignatureClass`] is the salient token set of a query (stop words and
//! very short tokens removed). Two queries with different signatures but a
//! high token overlap belong to the same class neighbourhood and can share
//! learned routing evidence through approximate lookup.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "do", "for", "from", "how",
    "i", "in", "into", "is", "it", "its", "me", "my", "of", "on", "or", "our", "please", "so",
    "that", "the", "their", "then", "this", "to", "up", "us", "we", "what", "when", "while",
    "with", "you", "your",
];

/// Lowercase, replace punctuation with spaces and collapse runs of whitespace.
pub fn normalize_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable hash of normalized query text
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuerySignature(pub String);

impl QuerySignature {
    pub fn from_text(text: &str) -> Self {
        let normalized = normalize_text(text);
        let digest = Sha256::digest(normalized.as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for QuerySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Salient token set of a query, used for nearest-class lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureClass {
    pub tokens: BTreeSet<String>,
}

impl SignatureClass {
    pub fn from_text(text: &str) -> Self {
        let tokens = normalize_text(text)
            .split(' ')
            .filter(|t| t.len() > 2 && !STOP_WORDS.contains(t))
            .map(str::to_string)
            .collect();
        Self { tokens }
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Jaccard similarity of the two token sets (0.0 when both are empty)
    pub fn similarity(&self, other: &SignatureClass) -> f64 {
        if self.tokens.is_empty() && other.tokens.is_empty() {
            return 0.0;
        }
        let intersection = self.tokens.intersection(&other.tokens).count();
        let union = self.tokens.union(&other.tokens).count();
        intersection as f64 / union as f64
    }
}
