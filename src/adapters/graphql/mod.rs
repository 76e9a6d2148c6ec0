//! GraphQL adapter - dynamic schema, resolver adaptation, request lifecycle.
//!
//! - `build_schema` - The workout API
//! - `ObjectTypeWithContext` - Registers resolvers that receive the request's context
//! - `RequestContextExtension` - Opens and closes one context per request

mod errors;
mod lifecycle;
mod resolver;
mod schema;

pub use lifecycle::RequestContextExtension;
pub use resolver::{
    ArgumentRenameError, ArgumentRenames, ContextResolver, FieldDef, ObjectTypeWithContext,
    Resolved, ResolverArgs, ResolverFuture,
};
pub use schema::{build_schema, IngestSummary, SchemaBuildError, SchemaServices};
