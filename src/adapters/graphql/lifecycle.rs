//! Request lifecycle hook.
//!
//! Opens a [`RequestContext`] when a GraphQL request starts processing and
//! closes it when the request finishes, whatever the outcome. The context is
//! placed in the request's data, where context resolvers pick it up.

use std::sync::{Arc, Mutex};

use async_graphql::extensions::{
    Extension, ExtensionContext, ExtensionFactory, NextPrepareRequest, NextRequest,
};
use async_graphql::{ErrorExtensions, Pos, Request, Response, ServerResult};

use crate::application::RequestContext;
use crate::ports::WorkoutStore;

/// Schema extension giving each request its own store session.
#[derive(Clone)]
pub struct RequestContextExtension {
    store: Arc<dyn WorkoutStore>,
}

impl RequestContextExtension {
    pub fn new(store: Arc<dyn WorkoutStore>) -> Self {
        Self { store }
    }
}

impl ExtensionFactory for RequestContextExtension {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(RequestScope {
            store: Arc::clone(&self.store),
            context: Mutex::new(None),
        })
    }
}

/// One instance per request.
///
/// If the request future is dropped before completion, this instance and
/// the request data are dropped with it, which releases the session.
struct RequestScope {
    store: Arc<dyn WorkoutStore>,
    context: Mutex<Option<Arc<RequestContext>>>,
}

impl RequestScope {
    fn take_context(&self) -> Option<Arc<RequestContext>> {
        match self.context.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn store_context(&self, context: Arc<RequestContext>) {
        match self.context.lock() {
            Ok(mut slot) => *slot = Some(context),
            Err(poisoned) => *poisoned.into_inner() = Some(context),
        }
    }
}

#[async_trait::async_trait]
impl Extension for RequestScope {
    async fn request(&self, ctx: &ExtensionContext<'_>, next: NextRequest<'_>) -> Response {
        let response = next.run(ctx).await;

        if let Some(context) = self.take_context() {
            context.close().await;
            if response.is_err() {
                tracing::debug!(
                    request_id = %context.request_id(),
                    errors = response.errors.len(),
                    "request finished with errors"
                );
            }
        }
        response
    }

    async fn prepare_request(
        &self,
        ctx: &ExtensionContext<'_>,
        request: Request,
        next: NextPrepareRequest<'_>,
    ) -> ServerResult<Request> {
        let context = RequestContext::open(self.store.as_ref())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to open request context");
                e.extend().into_server_error(Pos::default())
            })?;
        let context = Arc::new(context);
        self.store_context(Arc::clone(&context));

        next.run(ctx, request.data(context)).await
    }
}
