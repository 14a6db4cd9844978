//! Invariant checking.
//!
//! Invariants are properties that must hold after any sequence of hub
//! operations. They run against a [`SystemSnapshot`] rather than live state
//! so that one check sees one consistent point in time.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.check_all(&SystemSnapshot::capture(&hub))?;
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{ChainIntegrity, LogBound, MembershipConsistency, OwnerKnown};
pub use snapshot::SystemSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Which invariant was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantKind {
    /// [`MembershipConsistency`]
    MembershipConsistency,
    /// [`ChainIntegrity`]
    ChainIntegrity,
    /// [`LogBound`]
    LogBound,
    /// [`OwnerKnown`]
    OwnerKnown,
}

impl fmt::Display for InvariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MembershipConsistency => "membership_consistency",
            Self::ChainIntegrity => "chain_integrity",
            Self::LogBound => "log_bound",
            Self::OwnerKnown => "owner_known",
        };
        f.write_str(name)
    }
}

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Violated invariant
    pub invariant: InvariantKind,
    /// What went wrong
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against a snapshot.
pub trait Invariant: Send + Sync {
    /// Which invariant this is.
    fn kind(&self) -> InvariantKind;

    /// `Ok(())` if the property holds.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Set of invariants run together.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Every invariant in this crate.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(MembershipConsistency);
        registry.add(ChainIntegrity);
        registry.add(LogBound);
        registry.add(OwnerKnown);
        registry
    }

    /// Add an invariant.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every invariant. Returns all violations found.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
