use std::any::{Any, TypeId};
use std::sync::{Arc, Mutex};

use arbor_serializer::HostValue;
use tracing::{debug, warn};

use crate::context::InvocationContext;
use crate::error::{InvokeError, InvokeResult};
use crate::exported::Arg;

/// Observes method invocations for one context type. Registered per
/// bridge; each hook fires once per matching context item.
///
/// A failing `pre_invoke` aborts the call. A failing `post_invoke`
/// replaces the call's outcome with the failure. `invocation_error` may
/// not fail; anything it does wrong is swallowed.
pub trait InvocationCallback: Send + Sync {
    fn pre_invoke(
        &self,
        context: &Arc<dyn Any + Send + Sync>,
        instance: Option<&HostValue>,
        method: &str,
        args: &[Arg],
    ) -> InvokeResult<()> {
        let _ = (context, instance, method, args);
        Ok(())
    }

    fn post_invoke(
        &self,
        context: &Arc<dyn Any + Send + Sync>,
        instance: Option<&HostValue>,
        method: &str,
        result: Option<&HostValue>,
        error: Option<&InvokeError>,
    ) -> InvokeResult<()> {
        let _ = (context, instance, method, result, error);
        Ok(())
    }

    fn invocation_error(
        &self,
        context: &Arc<dyn Any + Send + Sync>,
        instance: Option<&HostValue>,
        method: &str,
        error: &str,
    ) {
        let _ = (context, instance, method, error);
    }
}

struct CallbackData {
    callback: Arc<dyn InvocationCallback>,
    context_type: TypeId,
}

impl CallbackData {
    fn understands(&self, item: &Arc<dyn Any + Send + Sync>) -> bool {
        (**item).type_id() == self.context_type
    }
}

/// Maintains the per-bridge callback list and fans invocation events out
/// to the callbacks whose context type matches.
#[derive(Default)]
pub struct CallbackController {
    callbacks: Mutex<Vec<CallbackData>>,
}

impl CallbackController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for context items of type `C`.
    pub fn register<C: Any>(&self, callback: Arc<dyn InvocationCallback>) {
        debug!(context = std::any::type_name::<C>(), "registered callback");
        self.callbacks.lock().unwrap().push(CallbackData {
            callback,
            context_type: TypeId::of::<C>(),
        });
    }

    /// Drops every callback registered for context type `C` that points at
    /// the same callback instance.
    pub fn unregister<C: Any>(&self, callback: &Arc<dyn InvocationCallback>) {
        let type_id = TypeId::of::<C>();
        self.callbacks.lock().unwrap().retain(|data| {
            !(data.context_type == type_id && Arc::ptr_eq(&data.callback, callback))
        });
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.lock().unwrap().is_empty()
    }

    pub fn pre_invoke(
        &self,
        context: &InvocationContext,
        instance: Option<&HostValue>,
        method: &str,
        args: &[Arg],
    ) -> InvokeResult<()> {
        let callbacks = self.callbacks.lock().unwrap();
        for item in context.items() {
            for data in callbacks.iter().filter(|d| d.understands(item)) {
                data.callback.pre_invoke(item, instance, method, args)?;
            }
        }
        Ok(())
    }

    pub fn post_invoke(
        &self,
        context: &InvocationContext,
        instance: Option<&HostValue>,
        method: &str,
        result: Option<&HostValue>,
        error: Option<&InvokeError>,
    ) -> InvokeResult<()> {
        let callbacks = self.callbacks.lock().unwrap();
        for item in context.items() {
            for data in callbacks.iter().filter(|d| d.understands(item)) {
                data.callback
                    .post_invoke(item, instance, method, result, error)?;
            }
        }
        Ok(())
    }

    /// Error hooks never influence the call outcome; their own failures
    /// are logged and dropped.
    pub fn invocation_error(
        &self,
        context: &InvocationContext,
        instance: Option<&HostValue>,
        method: &str,
        error: &str,
    ) {
        let callbacks = self.callbacks.lock().unwrap();
        for item in context.items() {
            for data in callbacks.iter().filter(|d| d.understands(item)) {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    data.callback.invocation_error(item, instance, method, error)
                }));
                if outcome.is_err() {
                    warn!(method, "error callback panicked, ignoring");
                }
            }
        }
    }
}
