//! Derives XML names and binding kinds from descriptor metadata.
//!
//! Resolution order for a member is fixed: `Ignore` suppresses it outright,
//! collections are always elements, then `Attribute` beats `Text` beats
//! `Element`. Anything without metadata becomes an element named after the
//! member.

use crate::meta::{TypeDescriptor, XmlMeta};
use crate::value::ValueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Attribute,
    Text,
    Element,
    Ignore,
}

/// Resolved binding of one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub kind: BindingKind,
    pub name: String,
}

impl Binding {
    fn new(kind: BindingKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
        }
    }
}

/// Root-name override if present, else the declared type name.
pub fn resolve_type_name(ty: &TypeDescriptor) -> &'static str {
    ty.root_name().unwrap_or(ty.type_name())
}

pub fn resolve_member(name: &str, kind: &ValueKind, meta: &XmlMeta) -> Binding {
    if meta.ignore {
        return Binding::new(BindingKind::Ignore, name);
    }
    if kind.is_sequence() {
        return Binding::new(BindingKind::Element, meta.element_name.unwrap_or(name));
    }
    if meta.attribute || meta.attribute_name.is_some() {
        return Binding::new(BindingKind::Attribute, meta.attribute_name.unwrap_or(name));
    }
    if meta.text {
        return Binding::new(BindingKind::Text, name);
    }
    Binding::new(BindingKind::Element, meta.element_name.unwrap_or(name))
}

/// Element name for the items of a collection.
///
/// A member-level override wins, then the item type's own item-name
/// override, then the item type's declared name.
pub fn resolve_item_name(item: &ValueKind, member_override: Option<&str>) -> String {
    if let Some(name) = member_override {
        return name.to_string();
    }
    match item.unwrap_optional() {
        ValueKind::Object(ty) => {
            let descriptor = ty.descriptor();
            descriptor
                .item_name()
                .unwrap_or(descriptor.type_name())
                .to_string()
        }
        other => other.declared_name(),
    }
}

/// A type-level root-name override beats the name the caller asked for.
pub fn canonical_element_name(ty: &TypeDescriptor, requested: &str) -> String {
    ty.root_name().unwrap_or(requested).to_string()
}

/// Name an element of `kind` is written under when the caller asks for `requested`.
pub fn element_name(kind: &ValueKind, requested: &str) -> String {
    match kind.unwrap_optional() {
        ValueKind::Object(ty) => canonical_element_name(&ty.descriptor(), requested),
        _ => requested.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{Member, XmlObject, descriptor_of};
    use crate::value::XmlValue;
    use xmlbind_support::ScalarType;

    #[derive(Debug, Clone, Default)]
    struct Badge {
        code: String,
    }

    impl XmlObject for Badge {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::builder::<Self>("Badge")
                .root_name("BadgeRoot")
                .item_name("B")
                .member(Member::field("Code", |b: &Self| &b.code, |b, v| b.code = v))
                .build()
        }
    }
    crate::xml_object!(Badge);

    #[derive(Debug, Clone, Default)]
    struct Plain;

    impl XmlObject for Plain {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::builder::<Self>("Plain").build()
        }
    }
    crate::xml_object!(Plain);

    fn meta() -> XmlMeta {
        XmlMeta::default()
    }

    #[test]
    fn test_type_name_prefers_root_override() {
        assert_eq!(resolve_type_name(&descriptor_of::<Badge>()), "BadgeRoot");
        assert_eq!(resolve_type_name(&descriptor_of::<Plain>()), "Plain");
    }

    #[test]
    fn test_binding_priority() {
        let scalar = ValueKind::Scalar(ScalarType::I32);

        let both = XmlMeta {
            attribute: true,
            text: true,
            element_name: Some("E"),
            ..meta()
        };
        assert_eq!(
            resolve_member("Id", &scalar, &both),
            Binding::new(BindingKind::Attribute, "Id")
        );

        let text = XmlMeta {
            text: true,
            element_name: Some("E"),
            ..meta()
        };
        assert_eq!(resolve_member("Id", &scalar, &text).kind, BindingKind::Text);

        let named = XmlMeta {
            attribute_name: Some("id"),
            ..meta()
        };
        assert_eq!(
            resolve_member("Id", &scalar, &named),
            Binding::new(BindingKind::Attribute, "id")
        );

        assert_eq!(
            resolve_member("Id", &scalar, &meta()),
            Binding::new(BindingKind::Element, "Id")
        );
    }

    #[test]
    fn test_ignore_wins_over_everything() {
        let ignored = XmlMeta {
            ignore: true,
            attribute: true,
            ..meta()
        };
        let kind = ValueKind::Scalar(ScalarType::String);
        assert_eq!(resolve_member("Secret", &kind, &ignored).kind, BindingKind::Ignore);
    }

    #[test]
    fn test_sequences_are_always_elements() {
        let as_attribute = XmlMeta {
            attribute: true,
            text: true,
            ..meta()
        };
        let binding = resolve_member("Values", &<Vec<i32>>::kind(), &as_attribute);
        assert_eq!(binding, Binding::new(BindingKind::Element, "Values"));

        let optional = resolve_member("Values", &<Option<Vec<i32>>>::kind(), &as_attribute);
        assert_eq!(optional.kind, BindingKind::Element);
    }

    #[test]
    fn test_item_name_resolution_order() {
        assert_eq!(resolve_item_name(&i32::kind(), Some("Item")), "Item");
        assert_eq!(resolve_item_name(&i32::kind(), None), "i32");
        assert_eq!(resolve_item_name(&Badge::kind(), None), "B");
        assert_eq!(resolve_item_name(&Badge::kind(), Some("Entry")), "Entry");
        assert_eq!(resolve_item_name(&Plain::kind(), None), "Plain");
        assert_eq!(resolve_item_name(&<Vec<String>>::kind(), None), "ArrayOfString");
    }

    #[test]
    fn test_root_override_beats_requested_element_name() {
        assert_eq!(element_name(&Badge::kind(), "Primary"), "BadgeRoot");
        assert_eq!(element_name(&<Option<Badge>>::kind(), "Primary"), "BadgeRoot");
        assert_eq!(element_name(&Plain::kind(), "Primary"), "Primary");
        assert_eq!(element_name(&i32::kind(), "Count"), "Count");
    }
}
