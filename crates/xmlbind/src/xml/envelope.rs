//! The document root wrapper.
//!
//! Every document carries its top-level value twice: an outer element named
//! after the value's resolved type name, and inside it the value itself under
//! the same name.
//!
//! ```text
//! <TestManager>
//!   <TestManager Id="1">
//!     ...
//!   </TestManager>
//! </TestManager>
//! ```

use std::any::Any;
use std::io::{BufRead, Write};

use super::de::XmlDeserializer;
use super::ser::XmlSerializer;
use crate::error::{ConversionError, Result};
use crate::meta::XmlObject;
use crate::meta::resolver::resolve_type_name;
use crate::value::ObjectType;

/// Pairs a value with its canonical root element name.
#[derive(Debug, Clone)]
pub struct RootEnvelope<V> {
    name: &'static str,
    value: V,
}

impl<V> RootEnvelope<V> {
    /// The outer element name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> &V {
        &self.value
    }
}

impl<'a, T: XmlObject> RootEnvelope<&'a T> {
    pub fn wrap(value: &'a T) -> Self {
        let name = resolve_type_name(&ObjectType::of::<T>().descriptor());
        Self { name, value }
    }

    pub fn write<W: Write>(&self, ser: &mut XmlSerializer<'_, W>) -> Result<()> {
        ser.start_element(self.name)?;
        ser.write_object(self.name, &ObjectType::of::<T>(), Some(self.value as &dyn Any))?;
        ser.end_element(self.name)
    }
}

impl<T: XmlObject> RootEnvelope<T> {
    /// Reads an enveloped `T`. An empty outer element yields `T::default()`.
    pub fn read<R: BufRead>(de: &mut XmlDeserializer<'_, R>) -> Result<Self> {
        let ty = ObjectType::of::<T>();
        let name = resolve_type_name(&ty.descriptor());

        let outer = de.read_start(name)?;
        if outer.empty {
            return Ok(Self {
                name,
                value: T::default(),
            });
        }
        let inner = de.read_object(name, &ty, Box::new(T::default()))?;
        de.read_end(name)?;

        let value = inner
            .downcast::<T>()
            .map_err(|_| ConversionError::Mismatch {
                expected: name,
                found: "object of another type",
            })?;
        Ok(Self {
            name,
            value: *value,
        })
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}
