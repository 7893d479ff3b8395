use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arbor_serializer::UnmarshalError;
use tracing::info;

/// Resolves one method parameter from a transport context item instead of
/// the wire. The dispatcher calls this with the first context item whose
/// type matches the registration.
pub trait ContextArgResolver: Send + Sync {
    fn resolve(
        &self,
        context_item: &Arc<dyn Any + Send + Sync>,
    ) -> Result<Arc<dyn Any + Send + Sync>, UnmarshalError>;
}

struct ResolverData {
    resolver: Arc<dyn ContextArgResolver>,
    context_type: TypeId,
}

/// Type-keyed registry of context-argument resolvers. A parameter declared
/// as `TypeDesc::Context(key)` is filled by the resolver registered under
/// that key whose context type is present in the call context.
#[derive(Default)]
pub struct ContextArgRegistry {
    resolvers: Mutex<HashMap<String, Vec<ResolverData>>>,
}

impl ContextArgRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver for parameter key `key`, matching context
    /// items of type `C`.
    pub fn register<C: Any>(&self, key: impl Into<String>, resolver: Arc<dyn ContextArgResolver>) {
        let key = key.into();
        info!(key, context = std::any::type_name::<C>(), "registered context arg resolver");
        self.resolvers
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .push(ResolverData {
                resolver,
                context_type: TypeId::of::<C>(),
            });
    }

    pub fn unregister(&self, key: &str) {
        self.resolvers.lock().unwrap().remove(key);
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.resolvers.lock().unwrap().contains_key(key)
    }

    /// Resolves `key` against the call context.
    pub fn resolve(
        &self,
        key: &str,
        context: &crate::context::InvocationContext,
    ) -> Result<Arc<dyn Any + Send + Sync>, UnmarshalError> {
        let resolvers = self.resolvers.lock().unwrap();
        let Some(entries) = resolvers.get(key) else {
            return Err(UnmarshalError::NoContextResolver);
        };
        for data in entries {
            for item in context.items() {
                if (**item).type_id() == data.context_type {
                    return data.resolver.resolve(item);
                }
            }
        }
        Err(UnmarshalError::NoContextResolver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InvocationContext;

    struct Session {
        user: String,
    }

    struct UserResolver;

    impl ContextArgResolver for UserResolver {
        fn resolve(
            &self,
            context_item: &Arc<dyn Any + Send + Sync>,
        ) -> Result<Arc<dyn Any + Send + Sync>, UnmarshalError> {
            let session = context_item
                .clone()
                .downcast::<Session>()
                .map_err(|_| UnmarshalError::ContextArg("not a session".to_string()))?;
            Ok(Arc::new(session.user.clone()))
        }
    }

    #[test]
    fn resolves_from_matching_context_item() {
        let registry = ContextArgRegistry::new();
        registry.register::<Session>("session.user", Arc::new(UserResolver));

        let context = InvocationContext::empty().with(Session {
            user: "ada".to_string(),
        });
        let resolved = registry.resolve("session.user", &context).unwrap();
        assert_eq!(*resolved.downcast::<String>().unwrap(), "ada");
    }

    #[test]
    fn missing_resolver_or_context_fails() {
        let registry = ContextArgRegistry::new();
        let context = InvocationContext::empty();
        assert!(registry.resolve("nope", &context).is_err());

        registry.register::<Session>("session.user", Arc::new(UserResolver));
        assert!(registry.resolve("session.user", &context).is_err());
    }
}
