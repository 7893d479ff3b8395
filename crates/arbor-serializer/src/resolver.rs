use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, warn};

use crate::classes::{ClassRegistry, ResolvedClass};
use crate::error::UnmarshalError;
use crate::types::TypeDesc;

const MAX_CLASSNAME_LENGTH: usize = 256;
const NEGATIVE_CACHE_CAPACITY: usize = 1024;

/// Prefixes that may never be named in a type hint, whatever the allow-list
/// says.
pub const DEFAULT_DISALLOWED_PREFIXES: &[&str] = &["javax.", "com.sun.", "sun."];

/// Controls which classes can get unmarshalled from a `javaClass` hint.
///
/// Every rule must pass: plausible name shape, allow-list membership or the
/// class's own safe-for-dispatch flag, no disallowed prefix, and an actual
/// entry in the class registry. Positive results are cached; negative
/// results sit in a bounded cache that is dropped whenever the registry
/// changes so later registrations get revisited.
pub struct ClassResolver {
    allowed: HashSet<String>,
    disallowed_prefixes: Vec<String>,
    registry: Arc<ClassRegistry>,
    positive: RwLock<HashMap<String, ResolvedClass>>,
    negative: Mutex<NegativeCache>,
}

struct NegativeCache {
    names: HashSet<String>,
    order: VecDeque<String>,
    generation: u64,
}

impl ClassResolver {
    pub fn with_defaults(registry: Arc<ClassRegistry>) -> Self {
        Self::new(
            registry,
            std::iter::empty::<&str>(),
            DEFAULT_DISALLOWED_PREFIXES.iter().copied(),
        )
    }

    pub fn new<A: Into<String>, D: Into<String>>(
        registry: Arc<ClassRegistry>,
        allowed: impl IntoIterator<Item = A>,
        disallowed_prefixes: impl IntoIterator<Item = D>,
    ) -> Self {
        let generation = registry.generation();
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            disallowed_prefixes: disallowed_prefixes.into_iter().map(Into::into).collect(),
            registry,
            positive: RwLock::new(HashMap::new()),
            negative: Mutex::new(NegativeCache {
                names: HashSet::new(),
                order: VecDeque::new(),
                generation,
            }),
        }
    }

    /// Resolves a hint name to a declared type, or `None` when the name is
    /// unknown or not allowed.
    pub fn try_resolve(&self, class_name: &str) -> Option<TypeDesc> {
        self.try_resolve_class(class_name).map(|c| c.type_desc())
    }

    pub fn resolve_or_err(&self, class_name: &str) -> Result<ResolvedClass, UnmarshalError> {
        self.try_resolve_class(class_name)
            .ok_or_else(|| UnmarshalError::ClassNotResolved(class_name.to_string()))
    }

    pub fn try_resolve_class(&self, class_name: &str) -> Option<ResolvedClass> {
        if class_name.is_empty() || class_name.len() > MAX_CLASSNAME_LENGTH {
            return None;
        }

        if let Some(hit) = self.positive.read().unwrap().get(class_name) {
            return Some(hit.clone());
        }
        if self.check_negative(class_name) {
            return None;
        }

        let resolved = self.resolve_uncached(class_name);
        match &resolved {
            Some(class) => {
                debug!(class = class_name, "marking class as resolvable");
                self.positive
                    .write()
                    .unwrap()
                    .insert(class_name.to_string(), class.clone());
            }
            None => {
                warn!(class = class_name, "marking class as not resolvable");
                self.remember_negative(class_name);
            }
        }
        resolved
    }

    fn resolve_uncached(&self, class_name: &str) -> Option<ResolvedClass> {
        // no default-package names
        if !class_name.contains('.') {
            return None;
        }
        for prefix in &self.disallowed_prefixes {
            if class_name.starts_with(prefix.as_str()) {
                return None;
            }
        }

        // array syntax is validated and stripped; the element class is what
        // gets gated and resolved
        let (element_name, _depth) = normalize_array_syntax(class_name)?;
        let known_allowed =
            self.allowed.contains(class_name) || self.allowed.contains(element_name);

        let resolved = self.registry.lookup(element_name)?;
        if !known_allowed && !resolved.safe_for_dispatch() {
            return None;
        }
        Some(resolved)
    }

    fn check_negative(&self, class_name: &str) -> bool {
        let mut cache = self.negative.lock().unwrap();
        let generation = self.registry.generation();
        if cache.generation != generation {
            cache.names.clear();
            cache.order.clear();
            cache.generation = generation;
            return false;
        }
        cache.names.contains(class_name)
    }

    fn remember_negative(&self, class_name: &str) {
        let mut cache = self.negative.lock().unwrap();
        if cache.names.insert(class_name.to_string()) {
            cache.order.push_back(class_name.to_string());
            while cache.order.len() > NEGATIVE_CACHE_CAPACITY {
                if let Some(evicted) = cache.order.pop_front() {
                    cache.names.remove(&evicted);
                }
            }
        }
    }
}

/// Strips JVM array syntax (`[`, optional `L`, trailing `;`) down to the
/// element type name, returning the name and the array depth. Returns
/// `None` when the syntax is degenerate.
fn normalize_array_syntax(class_name: &str) -> Option<(&str, usize)> {
    let bytes = class_name.as_bytes();
    let mut start = 0;
    let mut end = bytes.len();
    if end > 0 && bytes[end - 1] == b';' {
        end -= 1;
    }
    while start < end && bytes[start] == b'[' {
        start += 1;
    }
    let depth = start;
    if depth > 0 && start < end && bytes[start] == b'L' {
        start += 1;
    }
    if start >= end {
        return None;
    }
    Some((&class_name[start..end], depth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::{BeanClass, EnumClass};

    #[derive(Default)]
    struct Plain;

    fn registry_with_classes() -> Arc<ClassRegistry> {
        let registry = Arc::new(ClassRegistry::new());
        registry.register_bean(
            BeanClass::builder::<Plain>("com.example.Open")
                .constructor(Plain::default)
                .safe_for_dispatch(true)
                .build(),
        );
        registry.register_bean(
            BeanClass::builder::<Plain>("com.example.Guarded")
                .constructor(Plain::default)
                .build(),
        );
        registry.register_enum(EnumClass::new("com.example.Color", ["RED"]));
        registry
    }

    #[test]
    fn safe_flag_allows_resolution() {
        let resolver = ClassResolver::with_defaults(registry_with_classes());
        assert!(resolver.try_resolve("com.example.Open").is_some());
        assert!(resolver.try_resolve("com.example.Guarded").is_none());
    }

    #[test]
    fn allow_list_overrides_missing_flag() {
        let resolver = ClassResolver::new(
            registry_with_classes(),
            ["com.example.Guarded"],
            DEFAULT_DISALLOWED_PREFIXES.iter().copied(),
        );
        assert!(resolver.try_resolve("com.example.Guarded").is_some());
    }

    #[test]
    fn disallowed_prefixes_always_lose() {
        let registry = registry_with_classes();
        let resolver = ClassResolver::new(
            registry,
            ["javax.swing.JFrame"],
            DEFAULT_DISALLOWED_PREFIXES.iter().copied(),
        );
        assert!(resolver.try_resolve("javax.swing.JFrame").is_none());
        assert!(resolver.try_resolve("sun.misc.Unsafe").is_none());
    }

    #[test]
    fn rejects_degenerate_names() {
        let resolver = ClassResolver::with_defaults(registry_with_classes());
        assert!(resolver.try_resolve("").is_none());
        assert!(resolver.try_resolve("NoDots").is_none());
        assert!(resolver.try_resolve(&"x.".repeat(200)).is_none());
        assert!(resolver.try_resolve("[[[").is_none());
    }

    #[test]
    fn array_syntax_normalizes_to_element() {
        let resolver = ClassResolver::with_defaults(registry_with_classes());
        assert!(resolver.try_resolve("[Lcom.example.Open;").is_some());
        assert_eq!(
            normalize_array_syntax("[[Lcom.example.Open;"),
            Some(("com.example.Open", 2))
        );
        assert_eq!(normalize_array_syntax("com.example.Open"), Some(("com.example.Open", 0)));
    }

    #[test]
    fn containers_resolve_implicitly() {
        let resolver = ClassResolver::with_defaults(registry_with_classes());
        assert_eq!(
            resolver.try_resolve("java.util.HashMap"),
            Some(TypeDesc::Map("java.util.HashMap".to_string()))
        );
        assert_eq!(
            resolver.try_resolve("java.util.Date"),
            Some(TypeDesc::Date(crate::types::DateKind::DateTime))
        );
    }

    #[test]
    fn negative_cache_revisits_after_registration() {
        let registry = Arc::new(ClassRegistry::new());
        let resolver = ClassResolver::with_defaults(registry.clone());
        assert!(resolver.try_resolve("com.example.Late").is_none());

        registry.register_bean(
            BeanClass::builder::<Plain>("com.example.Late")
                .constructor(Plain::default)
                .safe_for_dispatch(true)
                .build(),
        );
        assert!(resolver.try_resolve("com.example.Late").is_some());
    }
}
