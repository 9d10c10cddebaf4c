//! Resolver errors.

use thiserror::Error;

use crate::events::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    /// The kind was already emitted in the current round.
    #[error("cannot commit same entity more than once: {kind}")]
    AlreadyCommitted { kind: EntityKind },
}
