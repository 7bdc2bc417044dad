//! XMP metadata: RDF/XML packets flattened into `Xmp.<prefix>.<path>` keys.
//!
//! Simple properties map to one `XmpText` record. Bag/Seq/Alt arrays of
//! simple values map to one record whose value joins the items with `", "`.
//! Language alternatives render as `lang="x-default" Text, lang="de" Text`.
//! Structs and arrays of structs produce a `type="Struct"` / `type="Seq"`
//! placeholder record followed by one record per field, addressed as
//! `Xmp.ns.Prop[1]/ns:field`.

pub mod namespaces;
mod reader;
mod writer;

pub use reader::{declared_namespaces, decode};
pub use writer::encode;

use crate::codec::{Change, is_container_marker, join_array};
use crate::error::{MetaError, Result};
use crate::types::{Standard, TagRecord, TagValue, TypeName};

/// RDF container kind of an array property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Bag,
    Seq,
    Alt,
}

impl ArrayKind {
    pub fn name(self) -> &'static str {
        match self {
            ArrayKind::Bag => "Bag",
            ArrayKind::Seq => "Seq",
            ArrayKind::Alt => "Alt",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Bag" => Some(ArrayKind::Bag),
            "Seq" => Some(ArrayKind::Seq),
            "Alt" => Some(ArrayKind::Alt),
            _ => None,
        }
    }

    pub fn type_name(self) -> TypeName {
        match self {
            ArrayKind::Bag => TypeName::XmpBag,
            ArrayKind::Seq => TypeName::XmpSeq,
            ArrayKind::Alt => TypeName::XmpAlt,
        }
    }

    pub fn from_type(type_name: TypeName) -> Option<Self> {
        match type_name {
            TypeName::XmpBag => Some(ArrayKind::Bag),
            TypeName::XmpSeq => Some(ArrayKind::Seq),
            TypeName::XmpAlt | TypeName::LangAlt => Some(ArrayKind::Alt),
            _ => None,
        }
    }
}

/// One node of the property tree. Names are `prefix:name`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Property {
    Text(String),
    Struct(Vec<(String, Property)>),
    /// Items carry their optional `xml:lang` qualifier.
    Array(ArrayKind, Vec<(Option<String>, Property)>),
}

/// One step below a top-level property.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    Field(String),
    Index(usize),
}

/// Split `Xmp.prefix.Name[2]/ns:field` into `prefix:Name` and its steps.
pub(crate) fn parse_path(key: &str) -> Result<(String, Vec<Step>)> {
    let invalid = || MetaError::InvalidKey(key.to_string());
    let rest = key.strip_prefix("Xmp.").ok_or_else(invalid)?;
    let (prefix, path) = rest.split_once('.').ok_or_else(invalid)?;
    if prefix.is_empty() {
        return Err(invalid());
    }

    let name_end = path.find(['[', '/']).unwrap_or(path.len());
    let name = &path[..name_end];
    if name.is_empty() {
        return Err(invalid());
    }

    let mut steps = Vec::new();
    let mut rest = &path[name_end..];
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or_else(invalid)?;
            let index: usize = after[..close].parse().map_err(|_| invalid())?;
            if index == 0 {
                return Err(invalid());
            }
            steps.push(Step::Index(index));
            rest = &after[close + 1..];
        } else if let Some(after) = rest.strip_prefix('/') {
            let end = after.find(['[', '/']).unwrap_or(after.len());
            let field = &after[..end];
            match field.split_once(':') {
                Some((p, n)) if !p.is_empty() && !n.is_empty() => {}
                _ => return Err(invalid()),
            }
            steps.push(Step::Field(field.to_string()));
            rest = &after[end..];
        } else {
            return Err(invalid());
        }
    }
    Ok((format!("{prefix}:{name}"), steps))
}

/// True when `record_key` names a struct field or array item of `key`.
pub fn is_child_of(record_key: &str, key: &str) -> bool {
    record_key
        .strip_prefix(key)
        .is_some_and(|rest| rest.starts_with('[') || rest.starts_with('/'))
}

/// Check that `packet` is well-formed XML before it is stored verbatim.
pub fn validate_packet(packet: &[u8]) -> Result<()> {
    let text = reader::packet_text(packet)?;
    roxmltree::Document::parse(text)
        .map(|_| ())
        .map_err(|e| MetaError::malformed(Standard::Xmp, e.to_string()))
}

/// Records replacing `change.key` in an XMP table.
///
/// Lists become one array record; its type is the stored array type, else
/// the type known for the property, else `XmpBag`.
pub fn records_for(change: &Change, stored: Option<TypeName>) -> Result<Vec<TagRecord>> {
    let key = change.key.as_str();
    parse_path(key)?;
    let known = namespaces::known_type(key);

    match &change.value {
        TagValue::Bytes(_) => Err(MetaError::unsupported_type(key, "text or list", "bytes")),
        TagValue::Text(text) => {
            let type_name = if is_container_marker(text) {
                change
                    .type_hint
                    .or(stored)
                    .filter(|t| t.is_xmp_array() || *t == TypeName::XmpText)
                    .unwrap_or(TypeName::XmpText)
            } else {
                change
                    .type_hint
                    .or(stored)
                    .or(known)
                    .unwrap_or(TypeName::XmpText)
            };
            Ok(vec![TagRecord::new(key, text.as_str(), xmp_type(type_name))])
        }
        TagValue::List(items) => {
            let type_name = change
                .type_hint
                .filter(|t| t.is_xmp_array())
                .or(stored.filter(|t| t.is_xmp_array()))
                .or(known.filter(|t| t.is_xmp_array()))
                .unwrap_or(TypeName::XmpBag);
            Ok(vec![TagRecord::new(key, join_array(items), type_name)])
        }
    }
}

/// Map caller-level type names onto XMP value kinds.
fn xmp_type(type_name: TypeName) -> TypeName {
    match type_name {
        TypeName::XmpText
        | TypeName::XmpAlt
        | TypeName::XmpBag
        | TypeName::XmpSeq
        | TypeName::LangAlt => type_name,
        TypeName::Array => TypeName::XmpBag,
        _ => TypeName::XmpText,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(key: &str, value: impl Into<TagValue>) -> Change {
        Change {
            key: key.to_string(),
            value: value.into(),
            type_hint: None,
        }
    }

    // ── Paths ────────────────────────────────────────────────────────

    #[test]
    fn parses_nested_paths() {
        let (top, steps) = parse_path("Xmp.xmpMM.History[2]/stEvt:action").unwrap();
        assert_eq!(top, "xmpMM:History");
        assert_eq!(
            steps,
            vec![Step::Index(2), Step::Field("stEvt:action".to_string())]
        );
        assert_eq!(parse_path("Xmp.dc.subject").unwrap().1, vec![]);
    }

    #[test]
    fn rejects_bad_paths() {
        for key in [
            "Xmp.dc",
            "Xmp..title",
            "Xmp.dc.title[0]",
            "Xmp.dc.title[x]",
            "Xmp.dc.title/field",
            "Exif.dc.title",
        ] {
            assert!(parse_path(key).is_err(), "{key}");
        }
    }

    #[test]
    fn child_detection() {
        assert!(is_child_of("Xmp.xmpMM.History[1]", "Xmp.xmpMM.History"));
        assert!(is_child_of("Xmp.xmpMM.History[1]/stEvt:action", "Xmp.xmpMM.History"));
        assert!(!is_child_of("Xmp.xmpMM.HistoryX", "Xmp.xmpMM.History"));
        assert!(!is_child_of("Xmp.xmpMM.History", "Xmp.xmpMM.History"));
    }

    // ── Records ──────────────────────────────────────────────────────

    #[test]
    fn list_uses_known_or_stored_array_type() {
        let r = records_for(&change("Xmp.dc.creator", vec!["a", "b"]), None).unwrap();
        assert_eq!((r[0].value.as_str(), r[0].type_name), ("a, b", TypeName::XmpSeq));

        let r = records_for(&change("Xmp.xmp.Custom", vec!["a"]), Some(TypeName::XmpSeq)).unwrap();
        assert_eq!(r[0].type_name, TypeName::XmpSeq);

        let r = records_for(&change("Xmp.xmp.Custom", vec!["a"]), Some(TypeName::XmpText)).unwrap();
        assert_eq!(r[0].type_name, TypeName::XmpBag);
    }

    #[test]
    fn text_keeps_stored_type() {
        let r = records_for(&change("Xmp.xmp.Rating", "4"), Some(TypeName::XmpText)).unwrap();
        assert_eq!(r[0].type_name, TypeName::XmpText);
        let r = records_for(&change("Xmp.dc.title", "Hi"), None).unwrap();
        assert_eq!(r[0].type_name, TypeName::LangAlt);
    }

    #[test]
    fn bytes_are_unsupported() {
        let err = records_for(&change("Xmp.xmp.Rating", vec![1u8]), None).unwrap_err();
        assert!(matches!(err, MetaError::UnsupportedType { .. }));
    }

    #[test]
    fn packet_validation() {
        assert!(validate_packet(b"<a/>").is_ok());
        assert!(matches!(
            validate_packet(b"<a>").unwrap_err(),
            MetaError::MalformedDirectory { .. }
        ));
    }
}
