// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Query - immutable routing input

use chrono::{DateTime, Utc};
use conductor_cortex::{QuerySignature, SignatureClass};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(pub Uuid);

impl QueryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

/// A free-form problem description plus optional attributes.
///
/// The signature is derived from the normalized text, so two queries that only
/// differ in case or punctuation share learned patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: QueryId,
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub signature: QuerySignature,
    pub class: SignatureClass,
    pub received_at: DateTime<Utc>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: QueryId::new(),
            signature: QuerySignature::from_text(&text),
            class: SignatureClass::from_text(&text),
            text,
            attributes: BTreeMap::new(),
            received_at: Utc::now(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes.extend(attributes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_ignores_case_and_punctuation() {
        let a = Query::new("Fix failing async test!");
        let b = Query::new("fix   failing async test");
        assert_eq!(a.signature, b.signature);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_attributes_do_not_change_signature() {
        let plain = Query::new("profile checkout latency");
        let tagged = Query::new("profile checkout latency").with_attribute("team", "payments");
        assert_eq!(plain.signature, tagged.signature);
        assert_eq!(tagged.attributes.get("team").map(String::as_str), Some("payments"));
    }
}
