//! XML reading and writing.
//!
//! The string and slice helpers use the process-wide [`AccessorCache`] and
//! the default [`StoreConfig`]. The reader/writer variants take both
//! explicitly.
//!
//! # Example
//!
//! ```ignore
//! use xmlbind::{from_xml_str, to_xml_string};
//!
//! let xml = to_xml_string(&manager)?;
//! let back: TestManager = from_xml_str(&xml)?;
//! ```

pub mod context;
mod de;
mod envelope;
mod ser;
pub mod utils;

use std::io::{BufRead, Write};

pub use de::{StartTag, XmlDeserializer};
pub use envelope::RootEnvelope;
pub use ser::XmlSerializer;

use crate::access::AccessorCache;
use crate::config::StoreConfig;
use crate::error::{Result, XmlBindError};
use crate::meta::XmlObject;

/// Writes the declaration and the enveloped `value` to `writer`.
pub fn to_xml_writer<T: XmlObject, W: Write>(
    value: &T,
    writer: W,
    accessors: &AccessorCache,
    config: &StoreConfig,
) -> Result<W> {
    let mut ser = XmlSerializer::new(writer, accessors, config);
    ser.write_declaration()?;
    RootEnvelope::wrap(value).write(&mut ser)?;
    Ok(ser.into_inner())
}

/// Reads an enveloped `T` from `reader`.
pub fn from_xml_reader<T: XmlObject, R: BufRead>(
    reader: R,
    accessors: &AccessorCache,
    config: &StoreConfig,
) -> Result<T> {
    let mut de = XmlDeserializer::new(reader, accessors, config);
    Ok(RootEnvelope::<T>::read(&mut de)?.into_inner())
}

/// Serializes `value` to an XML string.
pub fn to_xml_string<T: XmlObject>(value: &T) -> Result<String> {
    let accessors = AccessorCache::global();
    let bytes = to_xml_writer(value, Vec::new(), &accessors, &StoreConfig::default())?;
    String::from_utf8(bytes).map_err(|e| XmlBindError::Malformed(e.to_string()))
}

/// Deserializes a `T` from an XML string.
pub fn from_xml_str<T: XmlObject>(xml: &str) -> Result<T> {
    from_xml_slice(xml.as_bytes())
}

/// Deserializes a `T` from bytes. A leading byte-order mark is ignored.
pub fn from_xml_slice<T: XmlObject>(bytes: &[u8]) -> Result<T> {
    let accessors = AccessorCache::global();
    from_xml_reader(utils::strip_bom(bytes), &accessors, &StoreConfig::default())
}
