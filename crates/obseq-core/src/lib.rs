//! Core primitives for obseq.
//!
//! An [`ObservableSeq`] is an ordered collection whose elements are either
//! plain values or nested collections of the same kind, forming a tree. Every
//! mutation is recorded as a structured change event, batched per
//! transaction, and reported upward through the tree via non-owning parent
//! backreferences.
//!
//! The pieces, leaves first:
//! - [`registry::IdentityRegistry`] - weak parent set keyed by identity,
//! - [`change`] - the deep (path-addressed) and flat change event model,
//! - [`subject::Subject`] - the listener primitive notifications ride on,
//! - [`seq::ObservableSeq`] - the collection itself.
//!
//! Sequence diffing lives in the sibling `obseq-diff` crate.

pub mod change;
pub mod element;
pub mod error;
pub mod registry;
pub mod seq;
pub mod subject;

pub use change::{ChangeKind, DeepChange, FlatChange, Path};
pub use element::Element;
pub use error::SeqError;
pub use registry::IdentityRegistry;
pub use seq::ObservableSeq;
pub use subject::Subject;

use rand::Rng;

/// Minimum valid identity token for a collection node.
pub const MIN_IDENTITY: u64 = 65_536;

/// Returns `true` when the provided identity token is valid.
pub fn is_valid_identity(identity: u64) -> bool {
    identity >= MIN_IDENTITY
}

/// Generates a random identity token above [`MIN_IDENTITY`].
///
/// Tokens are not required to be globally unique; the parent registry
/// deduplicates by pointer identity and merely buckets by token, so a
/// collision costs a slightly longer bucket scan.
pub fn generate_identity() -> u64 {
    let mut rng = rand::thread_rng();
    rng.gen_range(MIN_IDENTITY..=i64::MAX as u64)
}

/// Returns the crate version at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identities_are_valid() {
        for _ in 0..64 {
            assert!(is_valid_identity(generate_identity()));
        }
    }
}
