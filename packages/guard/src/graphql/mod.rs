//! async-graphql integration
//!
//! Guards read their collaborators from schema data, so a schema built
//! without them runs unguarded. Use [`Turnstile::attach`] to register the
//! limiter, lockout guard, sanitizer and login protection in one call, and
//! put a [`RequestContext`](crate::RequestContext) into each request's data.

mod guards;
mod validation;

pub use guards::{LockoutGuard, RateLimitGuard};
pub use validation::validate_graphql_request;

use async_graphql::{ObjectType, SchemaBuilder, SubscriptionType};

use crate::service::Turnstile;

impl Turnstile {
    /// Register every guard component as schema data
    pub fn attach<Q, M, S>(&self, builder: SchemaBuilder<Q, M, S>) -> SchemaBuilder<Q, M, S>
    where
        Q: ObjectType + 'static,
        M: ObjectType + 'static,
        S: SubscriptionType + 'static,
    {
        builder
            .data(self.limiter().clone())
            .data(self.lockout().clone())
            .data(self.sanitizer().clone())
            .data(self.login())
    }
}
