//! # xmlbind
//!
//! Metadata-driven marshaling between object graphs and XML, with atomic,
//! stability-checked file persistence.
//!
//! ## Features
//!
//! - **Descriptor tables**: each type lists its members once, with binding
//!   metadata (attribute, text, element, ignore, name overrides). No runtime
//!   reflection is involved.
//! - **Accessor cache**: member getters/setters and method invokers are
//!   compiled into closures on first use and shared process-wide. A
//!   reflective mode bypasses the cache for debugging.
//! - **Streaming walker**: objects are written and read as quick-xml events
//!   without an intermediate tree. A broken member degrades to an empty
//!   element instead of failing the document (configurable).
//! - **Durable files**: saves go through a temporary and a rename; loads
//!   parse a private copy and retry while a concurrent writer is active.
//!
//! ## Document Shape
//!
//! | Member binding | XML |
//! |----------------|-----|
//! | `.attribute()` | `<User Id="7">` |
//! | `.text()` | `<Note>text</Note>` |
//! | element (default) | `<Name>Ada</Name>` |
//! | `Vec<i32>` with `.item_name("Item")` | `<Values><Item>1</Item><Item>2</Item></Values>` |
//! | `None` | `<Name/>` |
//!
//! The top-level value is always wrapped in an outer element of the same
//! name; see [`RootEnvelope`].
//!
//! ## Example
//!
//! ```ignore
//! use xmlbind::{Member, TypeDescriptor, XmlFileStore, XmlObject, StoreConfig, xml_object};
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct TestUser {
//!     id: i32,
//!     name: String,
//! }
//!
//! impl XmlObject for TestUser {
//!     fn describe() -> TypeDescriptor {
//!         TypeDescriptor::builder::<Self>("TestUser")
//!             .member(Member::field("Id", |u: &Self| &u.id, |u, v| u.id = v).attribute())
//!             .member(Member::field("Name", |u: &Self| &u.name, |u, v| u.name = v))
//!             .build()
//!     }
//! }
//! xml_object!(TestUser);
//!
//! let store = XmlFileStore::new(StoreConfig::default())?;
//! store.save(&user, "user.xml")?;
//! let back: TestUser = store.load("user.xml")?;
//! ```

pub mod access;
pub mod config;
pub mod error;
pub mod meta;
pub mod store;
pub mod value;
pub mod xml;

pub use xmlbind_support as support;

pub use access::{AccessStrategy, AccessorCache, CompiledAccess, Getter, Invoker, ReflectiveAccess, Setter};
pub use config::{AccessMode, FailurePolicy, StoreConfig};
pub use error::{AccessError, ConversionError, Result, XmlBindError};
pub use meta::{
    Binding, BindingKind, Member, MemberDescriptor, Method, MethodDescriptor, TypeDescriptor,
    XmlMeta, XmlObject, descriptor_of,
};
pub use store::{FsModificationClock, ModificationClock, XmlFileStore, load, save};
pub use support::{EnumInfo, Scalar, ScalarType, XmlEnum};
pub use value::{ObjectRef, ObjectType, Value, ValueKind, ValueRef, XmlValue};
pub use xml::{
    RootEnvelope, XmlDeserializer, XmlSerializer, from_xml_reader, from_xml_slice, from_xml_str,
    to_xml_string, to_xml_writer,
};
