//! Resolver adaptation layer.
//!
//! Resolvers in this crate are written against the request's
//! [`RequestContext`] rather than the framework's resolver context:
//!
//! ```text
//! async fn resolve(parent: Option<P>, ctx: Arc<RequestContext>, args: ResolverArgs)
//!     -> async_graphql::Result<Resolved>
//! ```
//!
//! [`ObjectTypeWithContext`] adapts such a resolver to a dynamic schema
//! field in two steps, always in this order:
//!
//! 1. argument renaming: declared external names are moved to the names the
//!    resolver expects (`input` becomes `record`);
//! 2. context injection: the request's context is taken from the per-request
//!    data installed by [`RequestContextExtension`](super::RequestContextExtension).

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputValue, Object, ResolverContext, SchemaBuilder, TypeRef,
};
use async_graphql::{ErrorExtensions, Value};
use futures::future::BoxFuture;
use thiserror::Error;

use crate::application::RequestContext;
use crate::domain::foundation::ErrorCode;

use super::errors::coded;

// ════════════════════════════════════════════════════════════════════════════
// Arguments
// ════════════════════════════════════════════════════════════════════════════

/// Arguments of one field invocation, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverArgs(BTreeMap<String, Value>);

impl ResolverArgs {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_context(ctx: &ResolverContext<'_>) -> Self {
        Self(
            ctx.args
                .iter()
                .map(|(name, value)| (name.to_string(), value.as_value().clone()))
                .collect(),
        )
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Integer argument; explicit null reads as absent.
    pub fn i32(&self, name: &str) -> async_graphql::Result<Option<i32>> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| invalid_argument(name, "is not a 32-bit integer")),
            Some(_) => Err(invalid_argument(name, "is not an integer")),
        }
    }

    /// String argument; explicit null reads as absent.
    pub fn string(&self, name: &str) -> async_graphql::Result<Option<String>> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(invalid_argument(name, "is not a string")),
        }
    }

    /// Argument converted to JSON, e.g. an input object as a dictionary.
    pub fn json(&self, name: &str) -> async_graphql::Result<Option<serde_json::Value>> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .clone()
                .into_json()
                .map(Some)
                .map_err(|e| invalid_argument(name, &e.to_string())),
        }
    }

    /// Like [`json`](Self::json) but absent is an error.
    pub fn required_json(&self, name: &str) -> async_graphql::Result<serde_json::Value> {
        self.json(name)?
            .ok_or_else(|| invalid_argument(name, "is required"))
    }
}

fn invalid_argument(name: &str, reason: &str) -> async_graphql::Error {
    coded(
        ErrorCode::ValidationFailed,
        format!("Argument '{}' {}", name, reason),
    )
}

// ════════════════════════════════════════════════════════════════════════════
// Renaming
// ════════════════════════════════════════════════════════════════════════════

/// A rename table could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentRenameError {
    #[error("Field '{type_name}.{field}' renames undeclared argument '{argument}'")]
    UndeclaredArgument {
        type_name: String,
        field: String,
        argument: String,
    },

    #[error("Field '{type_name}.{field}' maps both '{first}' and '{second}' onto '{target}'")]
    ConflictingTarget {
        type_name: String,
        field: String,
        first: String,
        second: String,
        target: String,
    },

    #[error("Argument '{argument}' not present in call to '{field}'")]
    MissingArgument { field: String, argument: String },
}

/// External argument name to internal parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentRenames {
    pairs: Vec<(String, String)>,
}

impl ArgumentRenames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `external -> internal`. A later mapping for the same external
    /// name replaces the earlier one.
    pub fn rename(mut self, external: impl Into<String>, internal: impl Into<String>) -> Self {
        let external = external.into();
        let internal = internal.into();
        match self.pairs.iter_mut().find(|(from, _)| *from == external) {
            Some(pair) => pair.1 = internal,
            None => self.pairs.push((external, internal)),
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    /// Checks the table against a field's declared arguments.
    pub fn validate<'a>(
        &self,
        type_name: &str,
        field: &str,
        declared: impl IntoIterator<Item = &'a str> + Clone,
    ) -> Result<(), ArgumentRenameError> {
        let mut targets: BTreeMap<&str, &str> = BTreeMap::new();
        for (external, internal) in self.iter() {
            if !declared.clone().into_iter().any(|name| name == external) {
                return Err(ArgumentRenameError::UndeclaredArgument {
                    type_name: type_name.to_string(),
                    field: field.to_string(),
                    argument: external.to_string(),
                });
            }
            if let Some(first) = targets.insert(internal, external) {
                return Err(ArgumentRenameError::ConflictingTarget {
                    type_name: type_name.to_string(),
                    field: field.to_string(),
                    first: first.to_string(),
                    second: external.to_string(),
                    target: internal.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Moves every renamed argument to its internal name.
    ///
    /// An existing argument already using the internal name is replaced.
    ///
    /// # Errors
    ///
    /// `MissingArgument` if an external name is absent from the call; in
    /// that case `args` is left untouched.
    pub fn apply(&self, field: &str, args: &mut ResolverArgs) -> Result<(), ArgumentRenameError> {
        if let Some((missing, _)) = self.iter().find(|(external, _)| !args.contains(external)) {
            return Err(ArgumentRenameError::MissingArgument {
                field: field.to_string(),
                argument: missing.to_string(),
            });
        }

        let moved: Vec<(&str, Value)> = self
            .iter()
            .filter_map(|(external, internal)| args.remove(external).map(|v| (internal, v)))
            .collect();
        for (internal, value) in moved {
            args.insert(internal, value);
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Resolver values
// ════════════════════════════════════════════════════════════════════════════

/// Output of a context resolver.
pub enum Resolved {
    Null,
    Value(Value),
    /// A typed parent for the field's object type, read back by child
    /// resolvers with `parent_value.try_downcast_ref`.
    Object(Box<dyn Any + Send + Sync>),
    List(Vec<Resolved>),
}

impl Resolved {
    pub fn value(value: impl Into<Value>) -> Self {
        Resolved::Value(value.into())
    }

    pub fn object<T: Any + Send + Sync>(object: T) -> Self {
        Resolved::Object(Box::new(object))
    }

    pub fn optional_object<T: Any + Send + Sync>(object: Option<T>) -> Self {
        object.map_or(Resolved::Null, Resolved::object)
    }

    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Resolved>,
    {
        Resolved::List(items.into_iter().collect())
    }

    fn into_field_value<'a>(self) -> FieldValue<'a> {
        match self {
            Resolved::Null => FieldValue::NULL,
            Resolved::Value(value) => FieldValue::value(value),
            Resolved::Object(object) => FieldValue::boxed_any(object),
            Resolved::List(items) => {
                FieldValue::list(items.into_iter().map(Resolved::into_field_value))
            }
        }
    }
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolved::Null => write!(f, "Null"),
            Resolved::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolved::Object(_) => write!(f, "Object(..)"),
            Resolved::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

pub type ResolverFuture = BoxFuture<'static, async_graphql::Result<Resolved>>;

/// A resolver that receives the request's context as its second argument.
pub trait ContextResolver<P>: Send + Sync + 'static {
    fn resolve(
        &self,
        parent: Option<P>,
        ctx: Arc<RequestContext>,
        args: ResolverArgs,
    ) -> ResolverFuture;
}

impl<P, F, Fut> ContextResolver<P> for F
where
    F: Fn(Option<P>, Arc<RequestContext>, ResolverArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = async_graphql::Result<Resolved>> + Send + 'static,
{
    fn resolve(
        &self,
        parent: Option<P>,
        ctx: Arc<RequestContext>,
        args: ResolverArgs,
    ) -> ResolverFuture {
        Box::pin(self(parent, ctx, args))
    }
}

/// Reads the request's context from per-request data.
fn injected_context(ctx: &ResolverContext<'_>) -> async_graphql::Result<Arc<RequestContext>> {
    ctx.ctx
        .data::<Arc<RequestContext>>()
        .map(Arc::clone)
        .map_err(|_| {
            tracing::error!("resolver invoked without a request context");
            coded(
                ErrorCode::ContextUnavailable,
                "No request context is active for this request",
            )
        })
}

// ════════════════════════════════════════════════════════════════════════════
// Field definitions
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct ArgumentDef {
    name: String,
    type_ref: TypeRef,
}

/// Shape of a wrapped field: return type, declared arguments, renames.
#[derive(Debug, Clone)]
pub struct FieldDef {
    type_ref: TypeRef,
    description: Option<String>,
    arguments: Vec<ArgumentDef>,
    renames: ArgumentRenames,
}

impl FieldDef {
    pub fn new(type_ref: TypeRef) -> Self {
        Self {
            type_ref,
            description: None,
            arguments: Vec::new(),
            renames: ArgumentRenames::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn argument(mut self, name: impl Into<String>, type_ref: TypeRef) -> Self {
        self.arguments.push(ArgumentDef {
            name: name.into(),
            type_ref,
        });
        self
    }

    /// Delivers argument `external` to the resolver as `internal`.
    pub fn rename(mut self, external: impl Into<String>, internal: impl Into<String>) -> Self {
        self.renames = self.renames.rename(external, internal);
        self
    }

    fn declared_arguments(&self) -> impl Iterator<Item = &str> + Clone {
        self.arguments.iter().map(|arg| arg.name.as_str())
    }
}

enum FieldEntry<P> {
    Wrapped {
        def: FieldDef,
        resolver: Arc<dyn ContextResolver<P>>,
    },
    Plain(Field),
}

// ════════════════════════════════════════════════════════════════════════════
// Object types
// ════════════════════════════════════════════════════════════════════════════

/// A schema object type whose fields are context resolvers.
///
/// `P` is the parent value type handed to resolvers; root types use `()`,
/// for which the parent is always `None`.
pub struct ObjectTypeWithContext<P = ()> {
    name: String,
    description: Option<String>,
    fields: Vec<(String, FieldEntry<P>)>,
}

impl<P> ObjectTypeWithContext<P>
where
    P: Any + Clone + Send + Sync,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Field names in schema order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Registers a context resolver for field `name`.
    ///
    /// Registering the same name again replaces the earlier field.
    ///
    /// # Errors
    ///
    /// `ArgumentRenameError` if the definition renames an argument it does
    /// not declare, or maps two arguments onto one internal name.
    pub fn field<R>(
        &mut self,
        name: impl Into<String>,
        def: FieldDef,
        resolver: R,
    ) -> Result<&mut Self, ArgumentRenameError>
    where
        R: ContextResolver<P>,
    {
        let name = name.into();
        def.renames
            .validate(&self.name, &name, def.declared_arguments())?;
        self.insert(
            name,
            FieldEntry::Wrapped {
                def,
                resolver: Arc::new(resolver),
            },
        );
        Ok(self)
    }

    /// Registers a plain framework field, bypassing renaming and injection.
    ///
    /// `configure` may add arguments or a description to the field.
    pub fn add_field<F>(
        &mut self,
        name: impl Into<String>,
        type_ref: TypeRef,
        resolve: F,
        configure: impl FnOnce(Field) -> Field,
    ) -> &mut Self
    where
        F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
    {
        let name = name.into();
        let field = configure(Field::new(name.clone(), type_ref, resolve));
        self.insert(name, FieldEntry::Plain(field));
        self
    }

    fn insert(&mut self, name: String, entry: FieldEntry<P>) {
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => {
                tracing::debug!(type_name = %self.name, field = %name, "replacing field resolver");
                slot.1 = entry;
            }
            None => self.fields.push((name, entry)),
        }
    }

    /// Builds the dynamic object type.
    pub fn into_object(self) -> Object {
        let mut object = Object::new(self.name);
        if let Some(description) = self.description {
            object = object.description(description);
        }
        for (name, entry) in self.fields {
            let field = match entry {
                FieldEntry::Wrapped { def, resolver } => wrap_field(name, def, resolver),
                FieldEntry::Plain(field) => field,
            };
            object = object.field(field);
        }
        object
    }

    /// Registers the type with a schema under construction.
    pub fn bind_to_schema(self, builder: SchemaBuilder) -> SchemaBuilder {
        builder.register(self.into_object())
    }
}

fn wrap_field<P>(name: String, def: FieldDef, resolver: Arc<dyn ContextResolver<P>>) -> Field
where
    P: Any + Clone + Send + Sync,
{
    let FieldDef {
        type_ref,
        description,
        arguments,
        renames,
    } = def;
    let renames = Arc::new(renames);
    let field_name = name.clone();

    let mut field = Field::new(name, type_ref, move |ctx| {
        let resolver = Arc::clone(&resolver);
        let renames = Arc::clone(&renames);
        let field_name = field_name.clone();
        FieldFuture::new(async move {
            let mut args = ResolverArgs::from_context(&ctx);
            renames
                .apply(&field_name, &mut args)
                .map_err(|e| e.extend())?;
            let request_context = injected_context(&ctx)?;
            let parent = ctx.parent_value.downcast_ref::<P>().cloned();

            // A null field must not become a parent for child resolvers.
            match resolver.resolve(parent, request_context, args).await? {
                Resolved::Null => Ok(None),
                resolved => Ok(Some(resolved.into_field_value())),
            }
        })
    });

    for argument in arguments {
        field = field.argument(InputValue::new(argument.name, argument.type_ref));
    }
    if let Some(description) = description {
        field = field.description(description);
    }
    field
}
