//! Reading object graphs from XML.
//!
//! [`XmlDeserializer`] pulls events from a quick-xml `NsReader`, flattens
//! them into owned [`Node`]s with one node of lookahead, and fills objects in
//! the order their descriptors declare members. Elements that match no
//! remaining member are skipped with their whole subtree.

use std::any::Any;
use std::io::BufRead;
use std::sync::Arc;

use quick_xml::NsReader;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::name::ResolveResult;

use super::context::SerializationContext;
use super::utils::is_whitespace;
use crate::access::AccessorCache;
use crate::config::{FailurePolicy, StoreConfig};
use crate::error::{ConversionError, Result, XmlBindError};
use crate::meta::resolver::{canonical_element_name, element_name, resolve_item_name};
use crate::meta::{BindingKind, MemberDescriptor, TypeDescriptor};
use crate::value::{ObjectRef, ObjectType, Value, ValueKind, ValueRef};

/// A start tag with its attributes decoded and unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    /// Local name, prefix stripped.
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<(String, String)>,
    /// `<name/>` rather than `<name>...</name>`.
    pub empty: bool,
}

impl StartTag {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn describe(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("<{{{}}}{}>", ns, self.name),
            None => format!("<{}>", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Start(StartTag),
    End(String),
    /// `literal` marks content from references or CDATA, which is never
    /// indentation.
    Text { content: String, literal: bool },
    Eof,
}

impl Node {
    fn text(content: String, literal: bool) -> Self {
        Node::Text { content, literal }
    }
}

fn malformed(err: impl std::fmt::Display) -> XmlBindError {
    XmlBindError::Malformed(err.to_string())
}

fn decode_utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(malformed)
}

fn start_tag(e: &BytesStart<'_>, namespace: ResolveResult<'_>, empty: bool) -> Result<StartTag> {
    let name = decode_utf8(e.local_name().as_ref())?.to_string();
    let namespace = match namespace {
        ResolveResult::Bound(ns) => Some(decode_utf8(ns.as_ref())?.to_string()),
        _ => None,
    };

    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(malformed)?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = decode_utf8(attr.key.local_name().as_ref())?.to_string();
        let raw = decode_utf8(&attr.value)?;
        let value = unescape(raw).map_err(malformed)?.into_owned();
        attributes.push((key, value));
    }

    Ok(StartTag {
        name,
        namespace,
        attributes,
        empty,
    })
}

fn resolve_reference(reference: &BytesRef<'_>) -> Result<String> {
    if let Some(ch) = reference.resolve_char_ref().map_err(malformed)? {
        return Ok(ch.to_string());
    }
    let name = decode_utf8(reference)?;
    resolve_predefined_entity(name)
        .map(str::to_string)
        .ok_or_else(|| XmlBindError::Malformed(format!("unknown entity '&{};'", name)))
}

fn read_node<R: BufRead>(reader: &mut NsReader<R>, buf: &mut Vec<u8>) -> Result<Node> {
    loop {
        buf.clear();
        let (namespace, event) = reader.read_resolved_event_into(buf)?;
        let node = match event {
            Event::Start(e) => Node::Start(start_tag(&e, namespace, false)?),
            Event::Empty(e) => Node::Start(start_tag(&e, namespace, true)?),
            Event::End(e) => Node::End(decode_utf8(e.local_name().as_ref())?.to_string()),
            Event::Text(t) => {
                Node::text(unescape(decode_utf8(&t)?).map_err(malformed)?.into_owned(), false)
            }
            Event::CData(c) => Node::text(decode_utf8(&c)?.to_string(), true),
            Event::GeneralRef(r) => Node::text(resolve_reference(&r)?, true),
            Event::Eof => Node::Eof,
            // Declarations, comments, processing instructions, doctypes.
            _ => continue,
        };
        return Ok(node);
    }
}

/// Decodes attribute or text content into a value of `kind`.
fn decode_text(kind: &ValueKind, text: &str) -> Result<Value> {
    match kind.unwrap_optional() {
        ValueKind::Scalar(scalar) => Ok(Value::Scalar(scalar.parse(text)?)),
        other => Err(ConversionError::Mismatch {
            expected: "scalar",
            found: other.label(),
        }
        .into()),
    }
}

/// Pulls an object graph out of a [`BufRead`].
pub struct XmlDeserializer<'c, R: BufRead> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    peeked: Option<Node>,
    accessors: &'c AccessorCache,
    policy: FailurePolicy,
    context: SerializationContext,
}

impl<'c, R: BufRead> XmlDeserializer<'c, R> {
    pub fn new(input: R, accessors: &'c AccessorCache, config: &StoreConfig) -> Self {
        let mut reader = NsReader::from_reader(input);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            buf: Vec::new(),
            peeked: None,
            accessors,
            policy: config.failure_policy,
            context: SerializationContext::new(),
        }
    }

    pub fn context(&self) -> &SerializationContext {
        &self.context
    }

    fn peek_node(&mut self) -> Result<&Node> {
        let node = match self.peeked.take() {
            Some(node) => node,
            None => read_node(&mut self.reader, &mut self.buf)?,
        };
        Ok(self.peeked.insert(node))
    }

    fn next_node(&mut self) -> Result<Node> {
        let node = match self.peeked.take() {
            Some(node) => node,
            None => read_node(&mut self.reader, &mut self.buf)?,
        };
        match &node {
            Node::Start(tag) if !tag.empty => self.context.enter(&tag.name),
            Node::End(_) => self.context.leave(),
            _ => {}
        }
        Ok(node)
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        loop {
            let blank = matches!(
                self.peek_node()?,
                Node::Text { content, literal: false } if is_whitespace(content)
            );
            if !blank {
                return Ok(());
            }
            self.next_node()?;
        }
    }

    /// Name and namespace both match. The namespace is the one the root declared.
    fn matches(&self, tag: &StartTag, name: &str) -> bool {
        tag.name == name && tag.namespace.as_deref() == self.context.namespace()
    }

    fn mismatch(&self, expected: &str, found: String) -> XmlBindError {
        XmlBindError::ElementNameMismatch {
            expected: expected.to_string(),
            found,
            path: self.context.path(),
        }
    }

    /// Whether the next element (after whitespace) is `<name>`.
    pub fn is_start_element(&mut self, name: &str) -> Result<bool> {
        self.skip_whitespace()?;
        Ok(match self.peek_node()?.clone() {
            Node::Start(tag) => self.matches(&tag, name),
            _ => false,
        })
    }

    /// Consumes `<name/>` if it is next. Anything else is left in place.
    fn take_empty(&mut self, name: &str) -> Result<bool> {
        self.skip_whitespace()?;
        let empty = match self.peek_node()?.clone() {
            Node::Start(tag) => tag.empty && self.matches(&tag, name),
            _ => false,
        };
        if empty {
            self.next_node()?;
        }
        Ok(empty)
    }

    /// Consumes `<expected>`. Nothing is consumed when the next node is
    /// anything else.
    pub fn read_start(&mut self, expected: &str) -> Result<StartTag> {
        self.skip_whitespace()?;
        match self.peek_node()?.clone() {
            Node::Start(tag) => {
                if self.context.depth() == 0 {
                    self.context.adopt_namespace(tag.namespace.clone());
                }
                if self.matches(&tag, expected) {
                    self.next_node()?;
                    Ok(tag)
                } else {
                    Err(self.mismatch(expected, tag.describe()))
                }
            }
            Node::End(name) => Err(self.mismatch(expected, format!("end of <{}>", name))),
            Node::Text { content, .. } => {
                Err(self.mismatch(expected, format!("text '{}'", content.trim())))
            }
            Node::Eof => Err(XmlBindError::UnexpectedEof {
                expected: expected.to_string(),
            }),
        }
    }

    /// Concatenated character data up to the closing tag. Markup is an error.
    fn read_text_content(&mut self) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.peek_node()?.clone() {
                Node::Text { content, .. } => {
                    self.next_node()?;
                    text.push_str(&content);
                }
                Node::End(_) => return Ok(text),
                Node::Start(tag) => {
                    return Err(XmlBindError::UnexpectedContent {
                        path: self.context.path(),
                        detail: format!("element {} inside character data", tag.describe()),
                    });
                }
                Node::Eof => {
                    return Err(XmlBindError::UnexpectedEof {
                        expected: format!("/{}", self.context.path()),
                    });
                }
            }
        }
    }

    /// Character data at the current position. Raw indentation alone is
    /// `None`; whitespace written as references is kept.
    fn read_text(&mut self) -> Result<Option<String>> {
        let mut text = String::new();
        let mut literal = false;
        while let Node::Text { content, literal: escaped } = self.peek_node()?.clone() {
            self.next_node()?;
            text.push_str(&content);
            literal |= escaped;
        }
        Ok((literal || !is_whitespace(&text)).then_some(text))
    }

    /// Consumes everything up to and including the closing tag of the current
    /// element. Unclaimed children are skipped.
    pub fn read_end(&mut self, name: &str) -> Result<()> {
        loop {
            match self.peek_node()?.clone() {
                Node::End(_) => {
                    self.next_node()?;
                    return Ok(());
                }
                Node::Start(tag) => {
                    tracing::debug!(
                        "Skipping unknown element {}",
                        self.context.child_path(&tag.name)
                    );
                    self.skip_element()?;
                }
                Node::Text { content, .. } => {
                    if !is_whitespace(&content) {
                        tracing::debug!("Skipping stray text at {}", self.context.path());
                    }
                    self.next_node()?;
                }
                Node::Eof => {
                    return Err(XmlBindError::UnexpectedEof {
                        expected: format!("/{}", name),
                    });
                }
            }
        }
    }

    /// Skips the next element and its subtree.
    pub fn skip_element(&mut self) -> Result<()> {
        let depth = self.context.depth();
        match self.next_node()? {
            Node::Start(tag) if tag.empty => Ok(()),
            Node::Start(_) => self.recover_to(depth),
            Node::Eof => Err(XmlBindError::UnexpectedEof {
                expected: "element".to_string(),
            }),
            other => Err(XmlBindError::Malformed(format!(
                "expected an element to skip, found {:?}",
                other
            ))),
        }
    }

    /// Consumes nodes until the element nesting is back at `depth`.
    fn recover_to(&mut self, depth: usize) -> Result<()> {
        while self.context.depth() > depth {
            if self.next_node()? == Node::Eof {
                return Err(XmlBindError::UnexpectedEof {
                    expected: "closing tag".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Advances to `<name>`, skipping siblings that no later member claims.
    ///
    /// Returns `false` when the element is not present before the parent
    /// closes or before an element that belongs to a later member.
    fn seek_element(&mut self, name: &str, later: &[&str]) -> Result<bool> {
        loop {
            self.skip_whitespace()?;
            let tag = match self.peek_node()? {
                Node::Start(tag) => tag.clone(),
                _ => return Ok(false),
            };
            // Same local name in a foreign namespace is left for read_start to reject.
            if tag.name == name {
                return Ok(true);
            }
            if later.contains(&tag.name.as_str()) {
                return Ok(false);
            }
            tracing::debug!("Skipping unknown element {}", self.context.child_path(&tag.name));
            self.skip_element()?;
        }
    }

    fn absorb(&self, err: XmlBindError, member: &MemberDescriptor) -> Result<()> {
        if self.policy.is_lenient() && err.is_recoverable() {
            tracing::warn!(
                "Failed to read member '{}' of {} at {}: {}. Keeping its current value.",
                member.name(),
                member.owner_name(),
                self.context.path(),
                err
            );
            Ok(())
        } else {
            Err(err)
        }
    }

    /// Reads `<name>` into `seed`, which must be an instance of `ty`.
    ///
    /// An empty element returns the seed untouched. A root-name override on
    /// `ty` replaces `name`.
    pub fn read_object(
        &mut self,
        name: &str,
        ty: &ObjectType,
        seed: Box<dyn Any>,
    ) -> Result<Box<dyn Any>> {
        let descriptor = ty.descriptor();
        let name = canonical_element_name(&descriptor, name);
        let start = self.read_start(&name)?;
        if start.empty {
            return Ok(seed);
        }

        let mut target = seed;
        let depth = self.context.depth();
        let members: Vec<&MemberDescriptor> = descriptor
            .members()
            .iter()
            .filter(|m| m.can_write() && !m.is_ignored())
            .collect();
        let element_names: Vec<Option<String>> = members
            .iter()
            .map(|m| {
                (m.binding().kind == BindingKind::Element)
                    .then(|| element_name(m.kind(), &m.binding().name))
            })
            .collect();

        for (index, member) in members.iter().enumerate() {
            let later: Vec<&str> = element_names[index + 1..]
                .iter()
                .flatten()
                .map(String::as_str)
                .collect();
            let outcome = self.read_member(
                &descriptor,
                member,
                &start,
                element_names[index].as_deref(),
                &later,
                &mut *target,
            );
            if let Err(err) = outcome {
                self.absorb(err, member)?;
                self.recover_to(depth)?;
            }
        }

        self.read_end(&name)?;
        Ok(target)
    }

    fn read_member(
        &mut self,
        ty: &Arc<TypeDescriptor>,
        member: &MemberDescriptor,
        start: &StartTag,
        element: Option<&str>,
        later: &[&str],
        target: &mut dyn Any,
    ) -> Result<()> {
        let value = match member.binding().kind {
            BindingKind::Attribute => match start.attribute(&member.binding().name) {
                Some(text) => decode_text(member.kind(), text)?,
                None => return Ok(()),
            },
            BindingKind::Text => match self.read_text()? {
                Some(text) => decode_text(member.kind(), &text)?,
                None => return Ok(()),
            },
            BindingKind::Element => {
                let Some(name) = element else {
                    return Ok(());
                };
                if !self.seek_element(name, later)? {
                    return Ok(());
                }
                // An empty scalar element leaves the member as it is.
                if matches!(member.kind(), ValueKind::Scalar(_)) && self.take_empty(name)? {
                    return Ok(());
                }
                let seed = self.seed_for(ty, member, &*target);
                self.read_value(name, member.kind(), member.meta().item_name, seed)?
            }
            BindingKind::Ignore => return Ok(()),
        };
        let setter = self.accessors.setter(ty, member.name())?;
        setter(target, value)
    }

    /// A copy of the member's current object value, so nested reads update it
    /// rather than replace it.
    fn seed_for(
        &self,
        ty: &Arc<TypeDescriptor>,
        member: &MemberDescriptor,
        target: &dyn Any,
    ) -> Option<Box<dyn Any>> {
        let ValueKind::Object(object_type) = member.kind().unwrap_optional() else {
            return None;
        };
        if !member.can_read() {
            return None;
        }
        let getter = self.accessors.getter(ty, member.name()).ok()?;
        match getter(target).ok()? {
            ValueRef::Object(ObjectRef::Borrowed(current)) => {
                object_type.descriptor().clone_boxed(current)
            }
            ValueRef::Object(ObjectRef::Owned(current)) => Some(current),
            _ => None,
        }
    }

    /// Reads one value of the given kind from `<name>`.
    ///
    /// Empty elements yield the kind's empty value: absent for optionals, the
    /// type default for scalars, an empty list for sequences and the seed for
    /// objects. Members bound to a scalar skip this and keep their value.
    pub fn read_value(
        &mut self,
        name: &str,
        kind: &ValueKind,
        item_override: Option<&str>,
        seed: Option<Box<dyn Any>>,
    ) -> Result<Value> {
        match kind {
            ValueKind::Optional(inner) => {
                if self.take_empty(name)? {
                    return Ok(kind.empty_value());
                }
                self.read_value(name, inner, item_override, seed)
            }
            ValueKind::Scalar(scalar) => {
                let start = self.read_start(name)?;
                if start.empty {
                    return Ok(kind.empty_value());
                }
                let text = self.read_text_content()?;
                self.read_end(name)?;
                Ok(Value::Scalar(scalar.parse(&text)?))
            }
            ValueKind::Sequence(item) => self.read_sequence(name, item, item_override),
            ValueKind::Object(ty) => {
                let seed = match seed {
                    Some(seed) => seed,
                    None => ty.descriptor().construct(),
                };
                Ok(Value::Object(self.read_object(name, ty, seed)?))
            }
        }
    }

    fn read_sequence(
        &mut self,
        name: &str,
        item: &ValueKind,
        item_override: Option<&str>,
    ) -> Result<Value> {
        let start = self.read_start(name)?;
        if start.empty {
            return Ok(Value::List(Vec::new()));
        }
        let item_name = element_name(item, &resolve_item_name(item, item_override));
        let mut items = Vec::new();
        while self.is_start_element(&item_name)? {
            items.push(self.read_value(&item_name, item, None, None)?);
        }
        self.read_end(name)?;
        Ok(Value::List(items))
    }
}
