//! Invocable methods declared alongside a type's members.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use crate::access::Invoker;
use crate::error::Result;
use crate::meta::XmlObject;
use crate::meta::member::downcast_mut;
use crate::value::{Value, XmlValue};

type MethodFn<T> = Arc<dyn Fn(&mut T, Vec<Value>) -> Result<Option<Value>> + Send + Sync>;

/// Untyped access to one method of one type.
pub trait MethodAccess: Send + Sync {
    /// Calls the method through dynamic dispatch.
    fn invoke(&self, target: &mut dyn Any, args: Vec<Value>) -> Result<Option<Value>>;

    /// Builds a standalone thunk for the accessor cache.
    fn compile(&self) -> Invoker;
}

struct TypedMethod<T> {
    name: &'static str,
    call: MethodFn<T>,
}

impl<T: XmlObject> MethodAccess for TypedMethod<T> {
    fn invoke(&self, target: &mut dyn Any, args: Vec<Value>) -> Result<Option<Value>> {
        let typed = downcast_mut::<T>(target, self.name)?;
        (self.call)(typed, args)
    }

    fn compile(&self) -> Invoker {
        let call = Arc::clone(&self.call);
        let name = self.name;
        Arc::new(
            move |target: &mut dyn Any, args: Vec<Value>| -> Result<Option<Value>> {
                let typed = downcast_mut::<T>(target, name)?;
                call(typed, args)
            },
        )
    }
}

fn single_arg<A: XmlValue>(args: Vec<Value>) -> Result<A> {
    let value = args.into_iter().next().unwrap_or(Value::Absent);
    Ok(A::from_value(value)?)
}

/// Builder for a method of `T`. Void methods return `None` when invoked.
pub struct Method<T> {
    name: &'static str,
    arity: usize,
    call: MethodFn<T>,
}

impl<T: XmlObject> Method<T> {
    fn new(name: &'static str, arity: usize, call: MethodFn<T>) -> Self {
        Self { name, arity, call }
    }

    pub fn action(name: &'static str, f: fn(&mut T)) -> Self {
        Self::new(
            name,
            0,
            Arc::new(move |target: &mut T, _args: Vec<Value>| -> Result<Option<Value>> {
                f(target);
                Ok(None)
            }),
        )
    }

    pub fn action_with<A: XmlValue>(name: &'static str, f: fn(&mut T, A)) -> Self {
        Self::new(
            name,
            1,
            Arc::new(move |target: &mut T, args: Vec<Value>| -> Result<Option<Value>> {
                f(target, single_arg::<A>(args)?);
                Ok(None)
            }),
        )
    }

    pub fn function<R: XmlValue>(name: &'static str, f: fn(&T) -> R) -> Self {
        Self::new(
            name,
            0,
            Arc::new(move |target: &mut T, _args: Vec<Value>| -> Result<Option<Value>> {
                Ok(Some(f(target).into_value()))
            }),
        )
    }

    pub fn function_with<A: XmlValue, R: XmlValue>(name: &'static str, f: fn(&mut T, A) -> R) -> Self {
        Self::new(
            name,
            1,
            Arc::new(move |target: &mut T, args: Vec<Value>| -> Result<Option<Value>> {
                Ok(Some(f(target, single_arg::<A>(args)?).into_value()))
            }),
        )
    }

    pub(crate) fn into_descriptor(self, owner: TypeId) -> MethodDescriptor {
        MethodDescriptor {
            owner,
            owner_name: type_name::<T>(),
            name: self.name,
            arity: self.arity,
            access: Box::new(TypedMethod {
                name: self.name,
                call: self.call,
            }),
        }
    }
}

pub struct MethodDescriptor {
    owner: TypeId,
    owner_name: &'static str,
    name: &'static str,
    arity: usize,
    access: Box<dyn MethodAccess>,
}

impl MethodDescriptor {
    pub fn owner(&self) -> TypeId {
        self.owner
    }

    pub fn owner_name(&self) -> &'static str {
        self.owner_name
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn access(&self) -> &dyn MethodAccess {
        self.access.as_ref()
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("owner", &self.owner_name)
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}
