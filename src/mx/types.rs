use std::collections::HashSet;
use std::fmt;

/// A mail exchanger for a domain and its preference (lower is tried first).
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MxRecord {
    pub preference: u16,
    pub exchange: String,
}

impl MxRecord {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

impl fmt::Display for MxRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.preference, self.exchange)
    }
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MxStatus {
    /// Records in the order they must be tried.
    Records(Vec<MxRecord>),
    NoRecords,
}

impl MxStatus {
    /// Orders raw lookup results: ascending preference, ties kept in the order
    /// the resolver returned them. A repeated exchange keeps only its first
    /// (most preferred) entry. A null MX (RFC 7505, exchange `.`) counts as
    /// no record.
    pub(crate) fn from_lookup(mut records: Vec<MxRecord>) -> Self {
        records.sort_by_key(|record| record.preference);
        let mut seen = HashSet::new();
        records.retain(|record| {
            !record.exchange.is_empty() && seen.insert(record.exchange.clone())
        });

        if records.is_empty() {
            Self::NoRecords
        } else {
            Self::Records(records)
        }
    }

    pub fn records(&self) -> &[MxRecord] {
        match self {
            Self::Records(records) => records.as_slice(),
            Self::NoRecords => &[],
        }
    }
}
