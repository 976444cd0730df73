//! Member descriptors and the typed accessors behind them.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::access::{Getter, Setter, getter_fn};
use crate::error::{AccessError, Result, XmlBindError};
use crate::meta::XmlObject;
use crate::meta::resolver::{Binding, BindingKind, resolve_member};
use crate::value::{Value, ValueKind, ValueRef, XmlValue};

/// Binding metadata a type declares for one of its members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlMeta {
    pub ignore: bool,
    pub attribute: bool,
    pub attribute_name: Option<&'static str>,
    pub text: bool,
    pub element_name: Option<&'static str>,
    /// Item element name for collection members.
    pub item_name: Option<&'static str>,
}

/// Untyped access to one member of one type.
///
/// `get`/`set` dispatch dynamically on every call. `compile_getter` and
/// `compile_setter` produce monomorphic thunks that the accessor cache
/// memoizes.
pub trait MemberAccess: Send + Sync {
    fn can_read(&self) -> bool;

    fn can_write(&self) -> bool;

    fn get<'a>(&self, target: &'a dyn Any) -> Result<ValueRef<'a>>;

    fn set(&self, target: &mut dyn Any, value: Value) -> Result<()>;

    fn compile_getter(&self) -> Option<Getter>;

    fn compile_setter(&self) -> Option<Setter>;
}

pub(crate) fn downcast_ref<'a, T: 'static>(
    target: &'a dyn Any,
    member: &'static str,
) -> Result<&'a T> {
    target.downcast_ref::<T>().ok_or_else(|| {
        XmlBindError::from(AccessError::TargetMismatch {
            expected: type_name::<T>(),
            member,
        })
    })
}

pub(crate) fn downcast_mut<'a, T: 'static>(
    target: &'a mut dyn Any,
    member: &'static str,
) -> Result<&'a mut T> {
    target.downcast_mut::<T>().ok_or_else(|| {
        XmlBindError::from(AccessError::TargetMismatch {
            expected: type_name::<T>(),
            member,
        })
    })
}

/// A stored field, optionally missing its getter or setter.
struct FieldAccess<T, F> {
    owner: &'static str,
    member: &'static str,
    get: Option<fn(&T) -> &F>,
    set: Option<fn(&mut T, F)>,
}

impl<T: XmlObject, F: XmlValue> FieldAccess<T, F> {
    fn not_readable(&self) -> XmlBindError {
        AccessError::NotReadable {
            type_name: self.owner,
            member: self.member.to_string(),
        }
        .into()
    }

    fn no_setter(&self) -> XmlBindError {
        XmlBindError::NoSetter {
            type_name: self.owner,
            member: self.member.to_string(),
        }
    }
}

impl<T: XmlObject, F: XmlValue> MemberAccess for FieldAccess<T, F> {
    fn can_read(&self) -> bool {
        self.get.is_some()
    }

    fn can_write(&self) -> bool {
        self.set.is_some()
    }

    fn get<'a>(&self, target: &'a dyn Any) -> Result<ValueRef<'a>> {
        let get = self.get.ok_or_else(|| self.not_readable())?;
        let typed = downcast_ref::<T>(target, self.member)?;
        Ok(get(typed).to_value())
    }

    fn set(&self, target: &mut dyn Any, value: Value) -> Result<()> {
        let set = self.set.ok_or_else(|| self.no_setter())?;
        let typed = downcast_mut::<T>(target, self.member)?;
        set(typed, F::from_value(value)?);
        Ok(())
    }

    fn compile_getter(&self) -> Option<Getter> {
        let get = self.get?;
        let member = self.member;
        Some(getter_fn(move |target| {
            let typed = downcast_ref::<T>(target, member)?;
            Ok(get(typed).to_value())
        }))
    }

    fn compile_setter(&self) -> Option<Setter> {
        let set = self.set?;
        let member = self.member;
        let setter: Setter = Arc::new(move |target: &mut dyn Any, value: Value| -> Result<()> {
            let typed = downcast_mut::<T>(target, member)?;
            set(typed, F::from_value(value)?);
            Ok(())
        });
        Some(setter)
    }
}

/// A read-only member whose value is computed on demand and may fail.
struct ComputedAccess<T, F> {
    owner: &'static str,
    member: &'static str,
    get: fn(&T) -> std::result::Result<F, AccessError>,
}

impl<T: XmlObject, F: XmlValue> MemberAccess for ComputedAccess<T, F> {
    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        false
    }

    fn get<'a>(&self, target: &'a dyn Any) -> Result<ValueRef<'a>> {
        let typed = downcast_ref::<T>(target, self.member)?;
        Ok((self.get)(typed)?.into_value().into())
    }

    fn set(&self, _target: &mut dyn Any, _value: Value) -> Result<()> {
        Err(XmlBindError::NoSetter {
            type_name: self.owner,
            member: self.member.to_string(),
        })
    }

    fn compile_getter(&self) -> Option<Getter> {
        let get = self.get;
        let member = self.member;
        Some(getter_fn(move |target| {
            let typed = downcast_ref::<T>(target, member)?;
            Ok(get(typed)?.into_value().into())
        }))
    }

    fn compile_setter(&self) -> Option<Setter> {
        None
    }
}

/// Builder for one member of `T`, consumed by
/// [`TypeDescriptorBuilder::member`](crate::meta::TypeDescriptorBuilder::member).
///
/// ```ignore
/// Member::field("Name", |u: &TestUser| &u.name, |u, v| u.name = v).attribute()
/// ```
pub struct Member<T> {
    name: &'static str,
    kind: ValueKind,
    meta: XmlMeta,
    access: Box<dyn MemberAccess>,
    _owner: PhantomData<fn() -> T>,
}

impl<T: XmlObject> Member<T> {
    fn with_access<F: XmlValue>(name: &'static str, access: impl MemberAccess + 'static) -> Self {
        Self {
            name,
            kind: F::kind(),
            meta: XmlMeta::default(),
            access: Box::new(access),
            _owner: PhantomData,
        }
    }

    /// A readable and writable member.
    pub fn field<F: XmlValue>(name: &'static str, get: fn(&T) -> &F, set: fn(&mut T, F)) -> Self {
        Self::with_access::<F>(
            name,
            FieldAccess {
                owner: type_name::<T>(),
                member: name,
                get: Some(get),
                set: Some(set),
            },
        )
    }

    /// Written but never read back.
    pub fn read_only<F: XmlValue>(name: &'static str, get: fn(&T) -> &F) -> Self {
        Self::with_access::<F>(
            name,
            FieldAccess::<T, F> {
                owner: type_name::<T>(),
                member: name,
                get: Some(get),
                set: None,
            },
        )
    }

    /// Read back but never written.
    pub fn write_only<F: XmlValue>(name: &'static str, set: fn(&mut T, F)) -> Self {
        Self::with_access::<F>(
            name,
            FieldAccess::<T, F> {
                owner: type_name::<T>(),
                member: name,
                get: None,
                set: Some(set),
            },
        )
    }

    /// Read-only value produced by a fallible function.
    pub fn computed<F: XmlValue>(
        name: &'static str,
        get: fn(&T) -> std::result::Result<F, AccessError>,
    ) -> Self {
        Self::with_access::<F>(
            name,
            ComputedAccess {
                owner: type_name::<T>(),
                member: name,
                get,
            },
        )
    }

    pub fn attribute(mut self) -> Self {
        self.meta.attribute = true;
        self
    }

    pub fn attribute_named(mut self, name: &'static str) -> Self {
        self.meta.attribute = true;
        self.meta.attribute_name = Some(name);
        self
    }

    pub fn text(mut self) -> Self {
        self.meta.text = true;
        self
    }

    pub fn element_named(mut self, name: &'static str) -> Self {
        self.meta.element_name = Some(name);
        self
    }

    pub fn item_name(mut self, name: &'static str) -> Self {
        self.meta.item_name = Some(name);
        self
    }

    pub fn ignore(mut self) -> Self {
        self.meta.ignore = true;
        self
    }

    pub(crate) fn into_descriptor(self, owner: TypeId, owner_name: &'static str) -> MemberDescriptor {
        let binding = resolve_member(self.name, &self.kind, &self.meta);
        MemberDescriptor {
            owner,
            owner_name,
            name: self.name,
            kind: self.kind,
            meta: self.meta,
            binding,
            access: self.access,
        }
    }
}

/// Immutable description of one member, derived once per type.
pub struct MemberDescriptor {
    owner: TypeId,
    owner_name: &'static str,
    name: &'static str,
    kind: ValueKind,
    meta: XmlMeta,
    binding: Binding,
    access: Box<dyn MemberAccess>,
}

impl MemberDescriptor {
    pub fn owner(&self) -> TypeId {
        self.owner
    }

    pub fn owner_name(&self) -> &'static str {
        self.owner_name
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn meta(&self) -> &XmlMeta {
        &self.meta
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn is_ignored(&self) -> bool {
        self.binding.kind == BindingKind::Ignore
    }

    pub fn can_read(&self) -> bool {
        self.access.can_read()
    }

    pub fn can_write(&self) -> bool {
        self.access.can_write()
    }

    pub fn access(&self) -> &dyn MemberAccess {
        self.access.as_ref()
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("owner", &self.owner_name)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("binding", &self.binding)
            .field("readable", &self.can_read())
            .field("writable", &self.can_write())
            .finish()
    }
}
