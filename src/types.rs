//! Core data model: metadata standards, tag tables and metadata sets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MetaError;

/// A metadata standard that can be embedded in an image container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standard {
    Exif,
    Iptc,
    Xmp,
    Comment,
    Icc,
}

impl Standard {
    /// All standards, in the order segments are usually laid out.
    pub const ALL: [Standard; 5] = [
        Standard::Exif,
        Standard::Xmp,
        Standard::Iptc,
        Standard::Icc,
        Standard::Comment,
    ];

    /// Lowercase name of the standard.
    pub fn name(self) -> &'static str {
        match self {
            Standard::Exif => "exif",
            Standard::Iptc => "iptc",
            Standard::Xmp => "xmp",
            Standard::Comment => "comment",
            Standard::Icc => "icc",
        }
    }

    /// True for standards whose content is a table of tags.
    pub fn is_tagged(self) -> bool {
        matches!(self, Standard::Exif | Standard::Iptc | Standard::Xmp)
    }

    /// Family prefix used by keys of this standard (`Exif`, `Iptc`, `Xmp`).
    pub fn key_family(self) -> Option<&'static str> {
        match self {
            Standard::Exif => Some("Exif"),
            Standard::Iptc => Some("Iptc"),
            Standard::Xmp => Some("Xmp"),
            Standard::Comment | Standard::Icc => None,
        }
    }
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type name attached to each record of a [`TagTable`].
///
/// `Str` and `Array` are what callers supply when they do not know the
/// binary type; the codecs resolve them against the tag dictionaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeName {
    Str,
    Array,
    // EXIF field types
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
    Ifd,
    Comment,
    // IPTC dataset types (`Short` and `Undefined` are shared)
    IptcString,
    Date,
    Time,
    // XMP value kinds
    XmpText,
    XmpAlt,
    XmpBag,
    XmpSeq,
    LangAlt,
}

impl TypeName {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeName::Str => "str",
            TypeName::Array => "array",
            TypeName::Byte => "Byte",
            TypeName::Ascii => "Ascii",
            TypeName::Short => "Short",
            TypeName::Long => "Long",
            TypeName::Rational => "Rational",
            TypeName::SByte => "SByte",
            TypeName::Undefined => "Undefined",
            TypeName::SShort => "SShort",
            TypeName::SLong => "SLong",
            TypeName::SRational => "SRational",
            TypeName::Float => "Float",
            TypeName::Double => "Double",
            TypeName::Ifd => "Ifd",
            TypeName::Comment => "Comment",
            TypeName::IptcString => "String",
            TypeName::Date => "Date",
            TypeName::Time => "Time",
            TypeName::XmpText => "XmpText",
            TypeName::XmpAlt => "XmpAlt",
            TypeName::XmpBag => "XmpBag",
            TypeName::XmpSeq => "XmpSeq",
            TypeName::LangAlt => "LangAlt",
        }
    }

    /// True for XMP array kinds whose text is joined with the array separator.
    pub fn is_xmp_array(self) -> bool {
        matches!(self, TypeName::XmpBag | TypeName::XmpSeq | TypeName::XmpAlt)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeName {
    type Err = MetaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = match s {
            "str" => TypeName::Str,
            "array" => TypeName::Array,
            "Byte" => TypeName::Byte,
            "Ascii" => TypeName::Ascii,
            "Short" => TypeName::Short,
            "Long" => TypeName::Long,
            "Rational" => TypeName::Rational,
            "SByte" => TypeName::SByte,
            "Undefined" => TypeName::Undefined,
            "SShort" => TypeName::SShort,
            "SLong" => TypeName::SLong,
            "SRational" => TypeName::SRational,
            "Float" => TypeName::Float,
            "Double" => TypeName::Double,
            "Ifd" => TypeName::Ifd,
            "Comment" => TypeName::Comment,
            "String" => TypeName::IptcString,
            "Date" => TypeName::Date,
            "Time" => TypeName::Time,
            "XmpText" => TypeName::XmpText,
            "XmpAlt" => TypeName::XmpAlt,
            "XmpBag" => TypeName::XmpBag,
            "XmpSeq" => TypeName::XmpSeq,
            "LangAlt" => TypeName::LangAlt,
            other => return Err(MetaError::invalid_value("type name", other)),
        };
        Ok(name)
    }
}

/// One `(tag, value, type-name)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub key: String,
    pub value: String,
    pub type_name: TypeName,
}

impl TagRecord {
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V, type_name: TypeName) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            type_name,
        }
    }
}

/// Ordered sequence of tag records, in on-disk directory order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagTable {
    records: Vec<TagRecord>,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TagRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TagRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[TagRecord] {
        &self.records
    }

    /// First record with the given key.
    pub fn get(&self, key: &str) -> Option<&TagRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    /// All records with the given key, in table order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a TagRecord> + 'a {
        self.records.iter().filter(move |r| r.key == key)
    }
}

impl FromIterator<TagRecord> for TagTable {
    fn from_iter<I: IntoIterator<Item = TagRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for TagTable {
    type Item = TagRecord;
    type IntoIter = std::vec::IntoIter<TagRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagTable {
    type Item = &'a TagRecord;
    type IntoIter = std::slice::Iter<'a, TagRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// A metadata value as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Text(String),
    List(Vec<String>),
    Bytes(Vec<u8>),
}

impl TagValue {
    /// Short name of the value shape, used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            TagValue::Text(_) => "text",
            TagValue::List(_) => "list",
            TagValue::Bytes(_) => "bytes",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            TagValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::Text(s.to_string())
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        TagValue::Text(s)
    }
}

impl From<Vec<String>> for TagValue {
    fn from(items: Vec<String>) -> Self {
        TagValue::List(items)
    }
}

impl From<Vec<&str>> for TagValue {
    fn from(items: Vec<&str>) -> Self {
        TagValue::List(items.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<u8>> for TagValue {
    fn from(bytes: Vec<u8>) -> Self {
        TagValue::Bytes(bytes)
    }
}

/// Mapping from tag key to value for one standard.
///
/// Iteration follows encounter order; equality ignores it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataSet {
    entries: Vec<(String, TagValue)>,
}

impl MetadataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace a value, keeping the key's original position.
    pub fn insert<K: Into<String>, V: Into<TagValue>>(&mut self, key: K, value: V) -> Option<TagValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<TagValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut TagValue> {
        self.entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl PartialEq for MetadataSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for MetadataSet {}

impl<K: Into<String>, V: Into<TagValue>> FromIterator<(K, V)> for MetadataSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = MetadataSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

impl IntoIterator for MetadataSet {
    type Item = (String, TagValue);
    type IntoIter = std::vec::IntoIter<(String, TagValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── TypeName ────────────────────────────────────────────────────

    #[test]
    fn type_names_round_trip_through_text() {
        for name in [
            TypeName::Str,
            TypeName::Array,
            TypeName::Rational,
            TypeName::IptcString,
            TypeName::LangAlt,
            TypeName::XmpSeq,
        ] {
            assert_eq!(name.as_str().parse::<TypeName>().unwrap(), name);
        }
        assert!("Nope".parse::<TypeName>().is_err());
    }

    #[test]
    fn iptc_string_uses_plain_name() {
        assert_eq!(TypeName::IptcString.to_string(), "String");
    }

    // ── MetadataSet ─────────────────────────────────────────────────

    #[test]
    fn insert_replaces_in_place() {
        let mut set = MetadataSet::new();
        set.insert("a", "1");
        set.insert("b", "2");
        let old = set.insert("a", "3");
        assert_eq!(old, Some(TagValue::from("1")));
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(set.get("a"), Some(&TagValue::from("3")));
    }

    #[test]
    fn equality_ignores_order() {
        let a: MetadataSet = vec![("x", "1"), ("y", "2")].into_iter().collect();
        let b: MetadataSet = vec![("y", "2"), ("x", "1")].into_iter().collect();
        assert_eq!(a, b);

        let c: MetadataSet = vec![("x", "1")].into_iter().collect();
        assert_ne!(a, c);
    }

    #[test]
    fn remove_returns_value() {
        let mut set: MetadataSet = vec![("k", vec!["a", "b"])].into_iter().collect();
        assert_eq!(
            set.remove("k"),
            Some(TagValue::List(vec!["a".into(), "b".into()]))
        );
        assert!(set.is_empty());
        assert_eq!(set.remove("k"), None);
    }

    #[test]
    fn tag_value_serializes_untagged() {
        let set: MetadataSet = vec![("k", TagValue::from(vec!["a", "b"]))].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert!(json.contains("[\"a\",\"b\"]"));
    }
}
