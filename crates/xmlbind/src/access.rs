//! Cached accessor thunks for members and methods.
//!
//! [`AccessorCache`] hands out getter, setter and invoker thunks keyed by
//! (type, member) or (type, method, arity). Two strategies sit behind it:
//!
//! - [`CompiledAccess`] builds a monomorphic closure per key on first request
//!   and memoizes it for the life of the process.
//! - [`ReflectiveAccess`] caches nothing and routes every call through the
//!   descriptor's dynamic accessor, tracing each call. It exists for stepping
//!   through member access in a debugger.
//!
//! The strategy is chosen once, when the cache is built.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::config::{AccessMode, StoreConfig};
use crate::error::{AccessError, Result, XmlBindError};
use crate::meta::{MemberDescriptor, TypeDescriptor};
use crate::value::{Value, ValueRef};

/// Reads a member from an instance of its owning type.
pub type Getter = Arc<dyn for<'a> Fn(&'a dyn Any) -> Result<ValueRef<'a>> + Send + Sync>;

/// Writes a member on an instance of its owning type.
pub type Setter = Arc<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>;

/// Calls a method. `Ok(None)` is the "no value" result of void methods.
pub type Invoker = Arc<dyn Fn(&mut dyn Any, Vec<Value>) -> Result<Option<Value>> + Send + Sync>;

/// Pins closure inference to the higher-ranked getter signature.
pub(crate) fn getter_fn<F>(f: F) -> Getter
where
    F: for<'a> Fn(&'a dyn Any) -> Result<ValueRef<'a>> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MemberKey {
    owner: TypeId,
    member: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MethodKey {
    owner: TypeId,
    name: &'static str,
    arity: usize,
}

fn find_member<'t>(ty: &'t TypeDescriptor, member: &str) -> Result<&'t MemberDescriptor> {
    ty.member(member).ok_or_else(|| {
        AccessError::UnknownMember {
            type_name: ty.type_name(),
            member: member.to_string(),
        }
        .into()
    })
}

fn not_readable(ty: &TypeDescriptor, member: &str) -> XmlBindError {
    AccessError::NotReadable {
        type_name: ty.type_name(),
        member: member.to_string(),
    }
    .into()
}

fn no_setter(ty: &TypeDescriptor, member: &str) -> XmlBindError {
    XmlBindError::NoSetter {
        type_name: ty.type_name(),
        member: member.to_string(),
    }
}

/// How accessor thunks are produced.
pub trait AccessStrategy: Send + Sync {
    fn mode(&self) -> AccessMode;

    fn getter(&self, ty: &Arc<TypeDescriptor>, member: &str) -> Result<Getter>;

    fn setter(&self, ty: &Arc<TypeDescriptor>, member: &str) -> Result<Setter>;

    fn invoker(&self, ty: &Arc<TypeDescriptor>, method: &str, arity: usize) -> Result<Invoker>;
}

/// Compiles each thunk once and memoizes it.
///
/// Each sub-cache has its own lock. A miss takes the write lock, checks again,
/// and only then compiles, so every caller of a key shares one thunk.
#[derive(Default)]
pub struct CompiledAccess {
    getters: RwLock<HashMap<MemberKey, Getter>>,
    setters: RwLock<HashMap<MemberKey, Setter>>,
    invokers: RwLock<HashMap<MethodKey, Invoker>>,
}

impl CompiledAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memoized thunks across all three sub-caches.
    pub fn len(&self) -> usize {
        self.getters.read().len() + self.setters.read().len() + self.invokers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AccessStrategy for CompiledAccess {
    fn mode(&self) -> AccessMode {
        AccessMode::Compiled
    }

    fn getter(&self, ty: &Arc<TypeDescriptor>, member: &str) -> Result<Getter> {
        let descriptor = find_member(ty, member)?;
        let key = MemberKey {
            owner: ty.type_id(),
            member: descriptor.name(),
        };
        if let Some(getter) = self.getters.read().get(&key) {
            return Ok(Arc::clone(getter));
        }

        let mut getters = self.getters.write();
        if let Some(getter) = getters.get(&key) {
            return Ok(Arc::clone(getter));
        }
        let getter = descriptor
            .access()
            .compile_getter()
            .ok_or_else(|| not_readable(ty, member))?;
        tracing::trace!("Compiled getter for {}.{}", ty.type_name(), member);
        getters.insert(key, Arc::clone(&getter));
        Ok(getter)
    }

    fn setter(&self, ty: &Arc<TypeDescriptor>, member: &str) -> Result<Setter> {
        let descriptor = find_member(ty, member)?;
        let key = MemberKey {
            owner: ty.type_id(),
            member: descriptor.name(),
        };
        if let Some(setter) = self.setters.read().get(&key) {
            return Ok(Arc::clone(setter));
        }

        let mut setters = self.setters.write();
        if let Some(setter) = setters.get(&key) {
            return Ok(Arc::clone(setter));
        }
        let setter = descriptor
            .access()
            .compile_setter()
            .ok_or_else(|| no_setter(ty, member))?;
        tracing::trace!("Compiled setter for {}.{}", ty.type_name(), member);
        setters.insert(key, Arc::clone(&setter));
        Ok(setter)
    }

    fn invoker(&self, ty: &Arc<TypeDescriptor>, method: &str, arity: usize) -> Result<Invoker> {
        let descriptor = ty.method(method, arity).ok_or_else(|| AccessError::UnknownMethod {
            type_name: ty.type_name(),
            method: method.to_string(),
            arity,
        })?;
        let key = MethodKey {
            owner: ty.type_id(),
            name: descriptor.name(),
            arity,
        };
        if let Some(invoker) = self.invokers.read().get(&key) {
            return Ok(Arc::clone(invoker));
        }

        let mut invokers = self.invokers.write();
        if let Some(invoker) = invokers.get(&key) {
            return Ok(Arc::clone(invoker));
        }
        let compiled = descriptor.access().compile();
        let name = descriptor.name();
        let invoker: Invoker = Arc::new(
            move |target: &mut dyn Any, args: Vec<Value>| -> Result<Option<Value>> {
                check_arity(name, arity, args.len())?;
                compiled(target, args)
            },
        );
        tracing::trace!("Compiled invoker for {}.{}/{}", ty.type_name(), method, arity);
        invokers.insert(key, Arc::clone(&invoker));
        Ok(invoker)
    }
}

fn check_arity(method: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(AccessError::Arity {
            method,
            expected,
            actual,
        }
        .into())
    }
}

/// Dispatches every call through the descriptor without caching.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReflectiveAccess;

impl AccessStrategy for ReflectiveAccess {
    fn mode(&self) -> AccessMode {
        AccessMode::Reflective
    }

    fn getter(&self, ty: &Arc<TypeDescriptor>, member: &str) -> Result<Getter> {
        let descriptor = find_member(ty, member)?;
        if !descriptor.can_read() {
            return Err(not_readable(ty, member));
        }
        let ty = Arc::clone(ty);
        let member = descriptor.name();
        Ok(getter_fn(move |target| {
            tracing::trace!("Reflective get {}.{}", ty.type_name(), member);
            find_member(&ty, member)?.access().get(target)
        }))
    }

    fn setter(&self, ty: &Arc<TypeDescriptor>, member: &str) -> Result<Setter> {
        let descriptor = find_member(ty, member)?;
        if !descriptor.can_write() {
            return Err(no_setter(ty, member));
        }
        let ty = Arc::clone(ty);
        let member = descriptor.name();
        let setter: Setter = Arc::new(move |target: &mut dyn Any, value: Value| -> Result<()> {
            tracing::trace!("Reflective set {}.{}", ty.type_name(), member);
            find_member(&ty, member)?.access().set(target, value)
        });
        Ok(setter)
    }

    fn invoker(&self, ty: &Arc<TypeDescriptor>, method: &str, arity: usize) -> Result<Invoker> {
        let descriptor = ty.method(method, arity).ok_or_else(|| AccessError::UnknownMethod {
            type_name: ty.type_name(),
            method: method.to_string(),
            arity,
        })?;
        let ty = Arc::clone(ty);
        let name = descriptor.name();
        let invoker: Invoker = Arc::new(
            move |target: &mut dyn Any, args: Vec<Value>| -> Result<Option<Value>> {
                tracing::trace!("Reflective invoke {}.{}/{}", ty.type_name(), name, arity);
                check_arity(name, arity, args.len())?;
                let method = ty.method(name, arity).ok_or_else(|| AccessError::UnknownMethod {
                    type_name: ty.type_name(),
                    method: name.to_string(),
                    arity,
                })?;
                method.access().invoke(target, args)
            },
        );
        Ok(invoker)
    }
}

static GLOBAL: OnceCell<Arc<AccessorCache>> = OnceCell::new();

/// Facade over the selected [`AccessStrategy`].
pub struct AccessorCache {
    strategy: Box<dyn AccessStrategy>,
}

impl AccessorCache {
    pub fn new(mode: AccessMode) -> Self {
        match mode {
            AccessMode::Compiled => Self::with_strategy(CompiledAccess::new()),
            AccessMode::Reflective => Self::with_strategy(ReflectiveAccess),
        }
    }

    pub fn with_strategy(strategy: impl AccessStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
        }
    }

    /// The process-wide cache.
    ///
    /// Its mode comes from `XMLBIND_ACCESS_MODE` unless [`AccessorCache::install_global`]
    /// ran first.
    pub fn global() -> Arc<AccessorCache> {
        let cache = GLOBAL.get_or_init(|| {
            Arc::new(AccessorCache::new(StoreConfig::from_env().access_mode))
        });
        Arc::clone(cache)
    }

    /// Selects the process-wide mode. Returns `false` if the global cache already exists.
    pub fn install_global(mode: AccessMode) -> bool {
        GLOBAL.set(Arc::new(AccessorCache::new(mode))).is_ok()
    }

    /// The global cache when it runs in `mode`, otherwise a private one.
    pub fn shared(mode: AccessMode) -> Arc<AccessorCache> {
        let global = Self::global();
        if global.mode() == mode {
            global
        } else {
            Arc::new(AccessorCache::new(mode))
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.strategy.mode()
    }

    pub fn getter(&self, ty: &Arc<TypeDescriptor>, member: &str) -> Result<Getter> {
        self.strategy.getter(ty, member)
    }

    /// Fails with [`XmlBindError::NoSetter`] when the member has no mutator.
    pub fn setter(&self, ty: &Arc<TypeDescriptor>, member: &str) -> Result<Setter> {
        self.strategy.setter(ty, member)
    }

    pub fn invoker(&self, ty: &Arc<TypeDescriptor>, method: &str, arity: usize) -> Result<Invoker> {
        self.strategy.invoker(ty, method, arity)
    }
}

impl std::fmt::Debug for AccessorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessorCache")
            .field("mode", &self.mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{Member, Method, XmlObject, descriptor_of};
    use xmlbind_support::Scalar;

    #[derive(Debug, Clone, Default)]
    struct Counter {
        count: i32,
        label: String,
        created: i64,
        note: String,
    }

    impl XmlObject for Counter {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::builder::<Self>("Counter")
                .member(Member::field("Count", |c: &Self| &c.count, |c, v| c.count = v))
                .member(Member::read_only("Created", |c: &Self| &c.created))
                .member(Member::write_only("Note", |c: &mut Self, v: String| c.note = v))
                .member(Member::field("Label", |c: &Self| &c.label, |c, v| c.label = v))
                .method(Method::action("Increment", |c: &mut Self| c.count += 1))
                .method(Method::action_with("Add", |c: &mut Self, n: i32| c.count += n))
                .method(Method::function("Doubled", |c: &Self| c.count * 2))
                .build()
        }
    }
    crate::xml_object!(Counter);

    fn counter_type() -> Arc<TypeDescriptor> {
        descriptor_of::<Counter>()
    }

    #[test]
    fn test_compiled_getter_is_memoized() -> Result<()> {
        let cache = CompiledAccess::new();
        let ty = counter_type();
        let first = cache.getter(&ty, "Count")?;
        let second = cache.getter(&ty, "Count")?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let counter = Counter {
            count: 7,
            ..Default::default()
        };
        match first(&counter)? {
            ValueRef::Scalar(Scalar::Int(7)) => {}
            other => panic!("unexpected value: {}", other.kind_name()),
        }
        Ok(())
    }

    #[test]
    fn test_setter_writes_through() -> Result<()> {
        let cache = AccessorCache::new(AccessMode::Compiled);
        let ty = counter_type();
        let mut counter = Counter::default();
        let setter = cache.setter(&ty, "Label")?;
        setter(&mut counter, Value::Scalar(Scalar::Str("ready".into())))?;
        assert_eq!(counter.label, "ready");

        let note = cache.setter(&ty, "Note")?;
        note(&mut counter, Value::Scalar(Scalar::Str("n".into())))?;
        assert_eq!(counter.note, "n");
        Ok(())
    }

    #[test]
    fn test_missing_setter_is_reported() {
        for mode in [AccessMode::Compiled, AccessMode::Reflective] {
            let cache = AccessorCache::new(mode);
            let err = cache.setter(&counter_type(), "Created").err();
            assert!(
                matches!(err, Some(XmlBindError::NoSetter { ref member, .. }) if member == "Created"),
                "mode {mode:?} returned {err:?}"
            );
        }
    }

    #[test]
    fn test_write_only_member_has_no_getter() {
        let cache = AccessorCache::new(AccessMode::Compiled);
        let err = cache.getter(&counter_type(), "Note").err();
        assert!(matches!(
            err,
            Some(XmlBindError::Access(AccessError::NotReadable { .. }))
        ));
    }

    #[test]
    fn test_unknown_member_is_an_access_error() {
        let cache = AccessorCache::new(AccessMode::Compiled);
        let err = cache.getter(&counter_type(), "Missing").err();
        assert!(matches!(
            err,
            Some(XmlBindError::Access(AccessError::UnknownMember { .. }))
        ));
    }

    #[test]
    fn test_void_methods_return_no_value() -> Result<()> {
        let cache = AccessorCache::new(AccessMode::Compiled);
        let ty = counter_type();
        let mut counter = Counter::default();

        let increment = cache.invoker(&ty, "Increment", 0)?;
        assert!(increment(&mut counter, Vec::new())?.is_none());
        assert_eq!(counter.count, 1);

        let add = cache.invoker(&ty, "Add", 1)?;
        assert!(add(&mut counter, vec![Value::Scalar(Scalar::Int(4))])?.is_none());
        assert_eq!(counter.count, 5);

        let doubled = cache.invoker(&ty, "Doubled", 0)?;
        match doubled(&mut counter, Vec::new())? {
            Some(Value::Scalar(Scalar::Int(10))) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_invoker_checks_arity() -> Result<()> {
        let cache = AccessorCache::new(AccessMode::Compiled);
        let ty = counter_type();
        let add = cache.invoker(&ty, "Add", 1)?;
        let err = add(&mut Counter::default(), Vec::new()).err();
        assert!(matches!(
            err,
            Some(XmlBindError::Access(AccessError::Arity {
                expected: 1,
                actual: 0,
                ..
            }))
        ));
        assert!(cache.invoker(&ty, "Add", 2).is_err());
        Ok(())
    }

    #[test]
    fn test_reflective_mode_matches_compiled_results() -> Result<()> {
        let reflective = AccessorCache::new(AccessMode::Reflective);
        assert_eq!(reflective.mode(), AccessMode::Reflective);
        let ty = counter_type();
        let mut counter = Counter::default();

        reflective.setter(&ty, "Count")?(&mut counter, Value::Scalar(Scalar::Int(3)))?;
        reflective.invoker(&ty, "Increment", 0)?(&mut counter, Vec::new())?;
        match reflective.getter(&ty, "Count")?(&counter)? {
            ValueRef::Scalar(Scalar::Int(4)) => {}
            other => panic!("unexpected value: {}", other.kind_name()),
        }

        // No memoization: each request builds a new thunk.
        let a = reflective.getter(&ty, "Count")?;
        let b = reflective.getter(&ty, "Count")?;
        assert!(!Arc::ptr_eq(&a, &b));
        Ok(())
    }

    #[test]
    fn test_concurrent_first_resolution_shares_one_thunk() {
        let cache = Arc::new(CompiledAccess::new());
        let ty = counter_type();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let ty = Arc::clone(&ty);
                std::thread::spawn(move || cache.getter(&ty, "Label"))
            })
            .collect();

        let getters: Vec<Getter> = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked").expect("getter failed"))
            .collect();
        assert!(getters.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_conversion_failure_in_setter_leaves_value() {
        let cache = AccessorCache::new(AccessMode::Compiled);
        let mut counter = Counter {
            count: 9,
            ..Default::default()
        };
        let setter = cache.setter(&counter_type(), "Count").expect("setter");
        let err = setter(&mut counter, Value::Scalar(Scalar::Str("nine".into()))).err();
        assert!(matches!(err, Some(XmlBindError::Conversion(_))));
        assert_eq!(counter.count, 9);
    }
}
