//! Per-type descriptor tables.
//!
//! A type opts into marshaling by implementing [`XmlObject::describe`], which
//! lists its members in declaration order together with their binding
//! metadata. Descriptors are built once per process on first use and shared
//! through [`descriptor_of`].
//!
//! ```ignore
//! #[derive(Debug, Clone, Default)]
//! struct TestUser {
//!     id: i32,
//!     name: String,
//!     tags: Vec<String>,
//! }
//!
//! impl XmlObject for TestUser {
//!     fn describe() -> TypeDescriptor {
//!         TypeDescriptor::builder::<Self>("TestUser")
//!             .member(Member::field("Id", |u: &Self| &u.id, |u, v| u.id = v).attribute())
//!             .member(Member::field("Name", |u: &Self| &u.name, |u, v| u.name = v))
//!             .member(Member::field("Tags", |u: &Self| &u.tags, |u, v| u.tags = v).item_name("Tag"))
//!             .build()
//!     }
//! }
//! xml_object!(TestUser);
//! ```

mod member;
mod method;
mod registry;
pub mod resolver;

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;

pub use member::{Member, MemberAccess, MemberDescriptor, XmlMeta};
pub use method::{Method, MethodAccess, MethodDescriptor};
pub use registry::descriptor_of;
pub use resolver::{Binding, BindingKind};

/// A type the walker can marshal.
///
/// `Default` supplies fresh read targets; `Clone` lets a nested read start
/// from a copy of the member's current value.
pub trait XmlObject: Any + Default + Clone {
    fn describe() -> TypeDescriptor;
}

/// Everything the walker needs to know about one type.
pub struct TypeDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    root_name: Option<&'static str>,
    item_name: Option<&'static str>,
    members: Vec<MemberDescriptor>,
    methods: Vec<MethodDescriptor>,
    construct: fn() -> Box<dyn Any>,
    clone_boxed: fn(&dyn Any) -> Option<Box<dyn Any>>,
}

impl TypeDescriptor {
    pub fn builder<T: XmlObject>(type_name: &'static str) -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder {
            type_name,
            root_name: None,
            item_name: None,
            members: Vec::new(),
            methods: Vec::new(),
            _type: PhantomData,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The declared name of the type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn root_name(&self) -> Option<&'static str> {
        self.root_name
    }

    pub fn item_name(&self) -> Option<&'static str> {
        self.item_name
    }

    /// Members in declaration order.
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name() == name)
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn method(&self, name: &str, arity: usize) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|m| m.name() == name && m.arity() == arity)
    }

    /// A fresh default instance.
    pub fn construct(&self) -> Box<dyn Any> {
        (self.construct)()
    }

    /// Clones `value` if it is an instance of this type.
    pub fn clone_boxed(&self, value: &dyn Any) -> Option<Box<dyn Any>> {
        (self.clone_boxed)(value)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("root_name", &self.root_name)
            .field("item_name", &self.item_name)
            .field("members", &self.members)
            .field("methods", &self.methods)
            .finish()
    }
}

fn construct<T: XmlObject>() -> Box<dyn Any> {
    Box::new(T::default())
}

fn clone_boxed<T: XmlObject>(value: &dyn Any) -> Option<Box<dyn Any>> {
    value
        .downcast_ref::<T>()
        .map(|typed| Box::new(typed.clone()) as Box<dyn Any>)
}

pub struct TypeDescriptorBuilder<T> {
    type_name: &'static str,
    root_name: Option<&'static str>,
    item_name: Option<&'static str>,
    members: Vec<Member<T>>,
    methods: Vec<Method<T>>,
    _type: PhantomData<fn() -> T>,
}

impl<T: XmlObject> TypeDescriptorBuilder<T> {
    /// Element name used whenever this type is written, overriding the caller's.
    pub fn root_name(mut self, name: &'static str) -> Self {
        self.root_name = Some(name);
        self
    }

    /// Element name for this type when it appears as a collection item.
    pub fn item_name(mut self, name: &'static str) -> Self {
        self.item_name = Some(name);
        self
    }

    pub fn member(mut self, member: Member<T>) -> Self {
        self.members.push(member);
        self
    }

    pub fn method(mut self, method: Method<T>) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(self) -> TypeDescriptor {
        let type_id = TypeId::of::<T>();
        let owner_name = self.type_name;
        TypeDescriptor {
            type_id,
            type_name: self.type_name,
            root_name: self.root_name,
            item_name: self.item_name,
            members: self
                .members
                .into_iter()
                .map(|m| m.into_descriptor(type_id, owner_name))
                .collect(),
            methods: self
                .methods
                .into_iter()
                .map(|m| m.into_descriptor(type_id))
                .collect(),
            construct: construct::<T>,
            clone_boxed: clone_boxed::<T>,
        }
    }
}
