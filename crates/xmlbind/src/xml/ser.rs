//! Writing object graphs as XML.
//!
//! [`XmlSerializer`] walks a value through its [`TypeDescriptor`] and streams
//! quick-xml events straight to the output. Attribute members are collected
//! onto the start tag first; text and element members follow in declaration
//! order.

use std::any::Any;
use std::borrow::Cow;
use std::io::Write;
use std::sync::Arc;

use quick_xml::Writer;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;

use super::context::SerializationContext;
use super::utils::{escape_attribute, escape_text, escape_whitespace, is_whitespace};
use crate::access::AccessorCache;
use crate::config::{FailurePolicy, StoreConfig};
use crate::error::{ConversionError, Result, XmlBindError};
use crate::meta::resolver::{canonical_element_name, element_name, resolve_item_name};
use crate::meta::{BindingKind, MemberDescriptor, TypeDescriptor};
use crate::value::{ObjectType, ValueKind, ValueRef};

/// Streams an object graph to a [`Write`] as XML.
pub struct XmlSerializer<'c, W: Write> {
    writer: Writer<W>,
    accessors: &'c AccessorCache,
    policy: FailurePolicy,
    context: SerializationContext,
}

impl<'c, W: Write> XmlSerializer<'c, W> {
    pub fn new(output: W, accessors: &'c AccessorCache, config: &StoreConfig) -> Self {
        let writer = if config.indent > 0 {
            Writer::new_with_indent(output, b' ', config.indent)
        } else {
            Writer::new(output)
        };
        Self {
            writer,
            accessors,
            policy: config.failure_policy,
            context: SerializationContext::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    pub fn context(&self) -> &SerializationContext {
        &self.context
    }

    /// Writes `<?xml version="1.0" encoding="utf-8"?>`.
    pub fn write_declaration(&mut self) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(())
    }

    /// Opens a bare element with no attributes.
    pub fn start_element(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::Start(BytesStart::new(name)))?;
        self.context.enter(name);
        Ok(())
    }

    pub fn end_element(&mut self, name: &str) -> Result<()> {
        self.context.leave();
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn write_empty(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::Empty(BytesStart::new(name)))?;
        Ok(())
    }

    fn write_scalar_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.writer.write_event(Event::Start(BytesStart::new(name)))?;
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(escape_text(text))))?;
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// Logs and swallows `err` under the lenient policy, otherwise returns it.
    fn absorb(&self, err: XmlBindError, what: &str) -> Result<()> {
        if self.policy.is_lenient() && err.is_recoverable() {
            tracing::warn!(
                "Failed to write {} at {}: {}. Writing it empty.",
                what,
                self.context.path(),
                err
            );
            Ok(())
        } else {
            Err(err)
        }
    }

    /// Writes `value` as an element, or an empty element when it is absent.
    ///
    /// A root-name override on the value's type replaces `name`.
    pub fn write_object(
        &mut self,
        name: &str,
        ty: &ObjectType,
        value: Option<&dyn Any>,
    ) -> Result<()> {
        let Some(object) = value else {
            return self.write_empty(name);
        };
        let descriptor = ty.descriptor();
        let name = canonical_element_name(&descriptor, name);

        let mut start = BytesStart::new(name.as_str());
        let mut content: Vec<&MemberDescriptor> = Vec::new();
        for member in descriptor.members() {
            if !member.can_read() {
                continue;
            }
            match member.binding().kind {
                BindingKind::Ignore => {}
                BindingKind::Attribute => {
                    if let Some(text) = self.attribute_text(&descriptor, member, object)? {
                        let escaped = escape_attribute(&text).into_owned();
                        start.push_attribute(Attribute {
                            key: QName(member.binding().name.as_bytes()),
                            value: Cow::Owned(escaped.into_bytes()),
                        });
                    }
                }
                BindingKind::Text | BindingKind::Element => content.push(member),
            }
        }

        self.writer.write_event(Event::Start(start))?;
        self.context.enter(&name);
        for member in content {
            let is_element = member.binding().kind == BindingKind::Element;
            let outcome = if is_element {
                self.write_element_member(&descriptor, member, object)
            } else {
                self.write_text_member(&descriptor, member, object)
            };
            if let Err(err) = outcome {
                self.absorb(err, &format!("member '{}'", member.name()))?;
                if is_element {
                    self.write_empty(&element_name(member.kind(), &member.binding().name))?;
                }
            }
        }
        self.context.leave();
        self.writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
        Ok(())
    }

    fn member_value<'v>(
        &self,
        ty: &Arc<TypeDescriptor>,
        member: &MemberDescriptor,
        object: &'v dyn Any,
    ) -> Result<ValueRef<'v>> {
        let getter = self.accessors.getter(ty, member.name())?;
        getter(object)
    }

    /// `None` leaves the attribute out. A failed member yields an empty value.
    fn attribute_text(
        &self,
        ty: &Arc<TypeDescriptor>,
        member: &MemberDescriptor,
        object: &dyn Any,
    ) -> Result<Option<String>> {
        let text = self
            .member_value(ty, member, object)
            .and_then(|value| scalar_text(member.kind(), value));
        match text {
            Ok(text) => Ok(text),
            Err(err) => {
                self.absorb(err, &format!("attribute '{}'", member.binding().name))?;
                Ok(Some(String::new()))
            }
        }
    }

    fn write_text_member(
        &mut self,
        ty: &Arc<TypeDescriptor>,
        member: &MemberDescriptor,
        object: &dyn Any,
    ) -> Result<()> {
        let value = self.member_value(ty, member, object)?;
        if let Some(text) = scalar_text(member.kind(), value)? {
            // Blank content goes out as character references so it cannot be
            // mistaken for indentation when read back.
            let escaped = if is_whitespace(&text) {
                Cow::Owned(escape_whitespace(&text))
            } else {
                escape_text(&text)
            };
            self.writer
                .write_event(Event::Text(BytesText::from_escaped(escaped)))?;
        }
        Ok(())
    }

    fn write_element_member(
        &mut self,
        ty: &Arc<TypeDescriptor>,
        member: &MemberDescriptor,
        object: &dyn Any,
    ) -> Result<()> {
        let value = self.member_value(ty, member, object)?;
        let name = element_name(member.kind(), &member.binding().name);
        self.write_value(&name, member.kind(), member.meta().item_name, value)
    }

    /// Writes one value of the given kind as an element named `name`.
    ///
    /// Kind and value are checked against each other before anything is
    /// written, so a mismatch leaves the output untouched.
    pub fn write_value(
        &mut self,
        name: &str,
        kind: &ValueKind,
        item_override: Option<&str>,
        value: ValueRef<'_>,
    ) -> Result<()> {
        match (kind.unwrap_optional(), value) {
            (_, ValueRef::Absent) => self.write_empty(name),
            (ValueKind::Scalar(_), ValueRef::Scalar(scalar)) => {
                self.write_scalar_element(name, &scalar.to_xml_text()?)
            }
            (ValueKind::Sequence(item), ValueRef::List(items)) => {
                self.write_sequence(name, item, item_override, items)
            }
            (ValueKind::Object(ty), ValueRef::Object(object)) => {
                self.write_object(name, ty, Some(object.as_any()))
            }
            (kind, value) => Err(ConversionError::Mismatch {
                expected: kind.label(),
                found: value.kind_name(),
            }
            .into()),
        }
    }

    fn write_sequence(
        &mut self,
        name: &str,
        item: &ValueKind,
        item_override: Option<&str>,
        items: Vec<ValueRef<'_>>,
    ) -> Result<()> {
        let item_name = element_name(item, &resolve_item_name(item, item_override));
        self.start_element(name)?;
        for (index, value) in items.into_iter().enumerate() {
            if let Err(err) = self.write_value(&item_name, item, None, value) {
                self.absorb(err, &format!("item {} of <{}>", index, name))?;
                self.write_empty(&item_name)?;
            }
        }
        self.end_element(name)
    }
}

/// Invariant text of a scalar value; `None` when the value is absent.
fn scalar_text(kind: &ValueKind, value: ValueRef<'_>) -> Result<Option<String>> {
    match (kind.unwrap_optional(), value) {
        (_, ValueRef::Absent) => Ok(None),
        (ValueKind::Scalar(_), ValueRef::Scalar(scalar)) => Ok(Some(scalar.to_xml_text()?)),
        (kind, value) => Err(ConversionError::Mismatch {
            expected: "scalar",
            found: if matches!(kind, ValueKind::Scalar(_)) {
                value.kind_name()
            } else {
                kind.label()
            },
        }
        .into()),
    }
}
