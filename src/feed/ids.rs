use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Hands out article identities during a parse.
///
/// Injected through [`ParseOptions`](super::ParseOptions) so no parser holds
/// global counters and tests can use a deterministic sequence.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// Next process-local id. Must increase monotonically per generator.
    fn next_local_id(&self) -> u64;

    /// A fresh external id for an article that arrived without one.
    fn generate_external_id(&self, local_id: u64) -> String;
}

/// Deterministic ids: local ids count up from 1, generated external ids are
/// `<prefix><local id>`.
#[derive(Debug)]
pub struct SequenceIds {
    next: AtomicU64,
    prefix: String,
}

impl SequenceIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            next: AtomicU64::new(1),
            prefix: prefix.into(),
        }
    }
}

impl Default for SequenceIds {
    fn default() -> Self {
        Self::new("generated-")
    }
}

impl IdGenerator for SequenceIds {
    fn next_local_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    fn generate_external_id(&self, local_id: u64) -> String {
        format!("{}{}", self.prefix, local_id)
    }
}

/// Local ids count up from 1, generated external ids are random v4 UUIDs.
#[derive(Debug)]
pub struct RandomIds {
    next: AtomicU64,
}

impl Default for RandomIds {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for RandomIds {
    fn next_local_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    fn generate_external_id(&self, _local_id: u64) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_ids_are_monotonic() {
        let ids = SequenceIds::new("t-");
        let a = ids.next_local_id();
        let b = ids.next_local_id();
        assert!(b > a);
        assert_eq!(ids.generate_external_id(a), format!("t-{a}"));
    }

    #[test]
    fn test_random_ids_unique() {
        let ids = RandomIds::default();
        let a = ids.generate_external_id(1);
        let b = ids.generate_external_id(1);
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
