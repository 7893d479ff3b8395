use std::any::Any;
use std::sync::Arc;

/// Opaque values the transport attaches to a call (request and response
/// objects, session handles). The core never looks inside them; callbacks
/// and context-argument resolvers match items by downcast.
#[derive(Clone, Default)]
pub struct InvocationContext {
    items: Vec<Arc<dyn Any + Send + Sync>>,
}

impl InvocationContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(items: Vec<Arc<dyn Any + Send + Sync>>) -> Self {
        Self { items }
    }

    pub fn with<T: Any + Send + Sync>(mut self, item: T) -> Self {
        self.items.push(Arc::new(item));
        self
    }

    pub fn items(&self) -> &[Arc<dyn Any + Send + Sync>] {
        &self.items
    }

    /// First context item of the given type.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.items
            .iter()
            .find_map(|item| item.clone().downcast::<T>().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup() {
        let context = InvocationContext::empty().with(42i64).with("req".to_string());
        assert_eq!(*context.get::<i64>().unwrap(), 42);
        assert_eq!(*context.get::<String>().unwrap(), "req");
        assert!(context.get::<f64>().is_none());
    }
}
