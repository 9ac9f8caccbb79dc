//! Optimistic concurrency primitives.

/// Version a writer read from a versioned row.
///
/// Stores use this as a compare-and-set precondition: a write succeeds only
/// if the row is still at this version.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExpectedVersion(u64);

impl ExpectedVersion {
    pub fn exact(version: u64) -> Self {
        Self(version)
    }

    pub fn version(self) -> u64 {
        self.0
    }

    pub fn matches(self, actual: u64) -> bool {
        self.0 == actual
    }
}
