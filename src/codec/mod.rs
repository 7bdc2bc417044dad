//! Conversions between tag tables and metadata sets.
//!
//! A tag table is the on-disk view: one record per stored value. A metadata
//! set is the caller's view: one entry per key, repeated records collapsed
//! into lists. This module owns both directions, plus the merge that applies
//! a caller's changes onto an existing table.

pub mod ucs2;

use crate::error::{MetaError, Result};
use crate::types::{MetadataSet, Standard, TagRecord, TagTable, TagValue, TypeName};
use crate::{exif, iptc, xmp};

/// Separator between elements of an XMP Bag/Seq/Alt text value.
///
/// Elements that themselves contain the separator are split apart on the
/// next read. This is a known limitation of the flat text form.
pub const ARRAY_SEPARATOR: &str = ", ";

pub fn join_array<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(ARRAY_SEPARATOR)
}

/// Split an array text value. The empty string is the empty array.
pub fn split_array(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(ARRAY_SEPARATOR).map(str::to_string).collect()
}

/// True for the placeholder value of an XMP struct or array-of-structs
/// record, such as `type="Struct"` or `type="Seq"`.
pub fn is_container_marker(value: &str) -> bool {
    marker_kind(value).is_some()
}

/// The container kind named by a marker value: `Struct` for `type="Struct"`.
pub fn marker_kind(value: &str) -> Option<&str> {
    value.strip_prefix("type=\"")?.strip_suffix('"')
}

/// One requested change to a standard's table.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub key: String,
    pub value: TagValue,
    /// Explicit type requested by the caller; `None` keeps the stored type.
    pub type_hint: Option<TypeName>,
}

impl Change {
    /// An empty list removes the key.
    pub fn is_delete(&self) -> bool {
        matches!(&self.value, TagValue::List(items) if items.is_empty())
    }
}

pub fn changes_from_set(set: &MetadataSet) -> Vec<Change> {
    set.iter()
        .map(|(key, value)| Change {
            key: key.to_string(),
            value: value.clone(),
            type_hint: None,
        })
        .collect()
}

/// Group caller-supplied triples by key.
///
/// `array` records carry a pre-joined list; several records for one key
/// become one list; any other type name is kept as an explicit type.
pub fn changes_from_table(table: &TagTable) -> Vec<Change> {
    let mut changes: Vec<Change> = Vec::new();
    for record in table {
        let (value, hint) = match record.type_name {
            TypeName::Array => (TagValue::List(split_array(&record.value)), None),
            TypeName::Str => (TagValue::Text(record.value.clone()), None),
            other => (TagValue::Text(record.value.clone()), Some(other)),
        };

        match changes.iter_mut().find(|c| c.key == record.key) {
            Some(change) => {
                append_value(&mut change.value, value);
                change.type_hint = change.type_hint.or(hint);
            }
            None => changes.push(Change {
                key: record.key.clone(),
                value,
                type_hint: hint,
            }),
        }
    }
    changes
}

/// Collapse a decoded table into a metadata set.
///
/// Repeated keys become lists in encounter order. XMP Bag/Seq values are
/// split into lists, and repeatable IPTC datasets are always lists.
pub fn collapse(table: &TagTable, standard: Standard) -> MetadataSet {
    let mut set = MetadataSet::new();
    for record in table {
        let value = match (standard, record.type_name) {
            (Standard::Xmp, TypeName::XmpBag | TypeName::XmpSeq)
                if !is_container_marker(&record.value) =>
            {
                TagValue::List(split_array(&record.value))
            }
            _ => TagValue::Text(record.value.clone()),
        };

        match set.get_mut(&record.key) {
            None => {
                set.insert(record.key.clone(), value);
            }
            Some(existing) => append_value(existing, value),
        }
    }

    if standard == Standard::Iptc {
        for key in iptc::REPEATABLE {
            if let Some(TagValue::Text(text)) = set.get(key).cloned() {
                set.insert(key, TagValue::List(vec![text]));
            }
        }
    }
    set
}

fn append_value(existing: &mut TagValue, value: TagValue) {
    let mut items = match std::mem::replace(existing, TagValue::List(vec![])) {
        TagValue::Text(t) => vec![t],
        TagValue::List(l) => l,
        TagValue::Bytes(_) => vec![],
    };
    match value {
        TagValue::Text(t) => items.push(t),
        TagValue::List(l) => items.extend(l),
        TagValue::Bytes(_) => {}
    }
    *existing = TagValue::List(items);
}

/// Check that `key` has the `Family.Group.Name` layout for `standard`.
pub fn validate_key(key: &str, standard: Standard) -> Result<()> {
    let family = standard
        .key_family()
        .ok_or_else(|| MetaError::InvalidKey(key.to_string()))?;
    let mut parts = key.splitn(3, '.');
    let ok = parts.next() == Some(family)
        && parts.next().is_some_and(|g| !g.is_empty())
        && parts.next().is_some_and(|n| !n.is_empty());
    if ok {
        Ok(())
    } else {
        Err(MetaError::InvalidKey(key.to_string()))
    }
}

/// Apply `changes` to `existing`.
///
/// Each changed key replaces every stored occurrence, at the position of the
/// first one (new keys go to the end). The stored type name survives unless
/// the change carries an explicit type. Deleting an XMP key also drops its
/// struct fields and array items.
pub fn merge(existing: &TagTable, changes: &[Change], standard: Standard) -> Result<TagTable> {
    let mut records: Vec<TagRecord> = existing.iter().cloned().collect();

    for change in changes {
        validate_key(&change.key, standard)?;

        let stored_type = records
            .iter()
            .find(|r| r.key == change.key)
            .map(|r| r.type_name);

        let replacement = if change.is_delete() {
            Vec::new()
        } else {
            match standard {
                Standard::Exif => exif::records_for(change, stored_type)?,
                Standard::Iptc => iptc::records_for(change, stored_type)?,
                Standard::Xmp => xmp::records_for(change, stored_type)?,
                Standard::Comment | Standard::Icc => {
                    return Err(MetaError::InvalidKey(change.key.clone()));
                }
            }
        };

        let drop_children = standard == Standard::Xmp
            && !replacement
                .iter()
                .any(|r| r.key == change.key && is_container_marker(&r.value));

        let mut merged = Vec::with_capacity(records.len() + replacement.len());
        let mut replacement = Some(replacement);
        for record in records {
            if record.key == change.key {
                if let Some(new_records) = replacement.take() {
                    merged.extend(new_records);
                }
                continue;
            }
            if drop_children && xmp::is_child_of(&record.key, &change.key) {
                continue;
            }
            merged.push(record);
        }
        if let Some(new_records) = replacement {
            merged.extend(new_records);
        }
        records = merged;
    }

    Ok(records.into_iter().collect())
}
