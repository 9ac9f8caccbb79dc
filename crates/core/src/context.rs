//! Request-scoped context passed explicitly into every mutating operation.

use crate::id::ActorId;

/// Identity of the caller for one request.
///
/// Built at the edge (HTTP middleware, CLI, test) and threaded through the
/// engine. Nothing in the core reads identity from process-wide state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestContext {
    actor: ActorId,
}

impl RequestContext {
    pub fn new(actor: ActorId) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }
}
