//! RDF/XML packet → flat tag table.

use roxmltree::{Document, Node};

use super::namespaces::{self, RDF, XML};
use super::{ArrayKind, Property};
use crate::codec::join_array;
use crate::error::{MetaError, Result};
use crate::types::{Standard, TagRecord, TagTable, TypeName};

pub fn decode(packet: &[u8]) -> Result<TagTable> {
    let text = packet_text(packet)?;
    if text.trim().is_empty() {
        return Ok(TagTable::new());
    }
    let doc = Document::parse(text).map_err(|e| MetaError::malformed(Standard::Xmp, e.to_string()))?;

    let mut table = TagTable::new();
    let Some(rdf) = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().namespace() == Some(RDF) && n.tag_name().name() == "RDF")
    else {
        log::debug!("XMP packet has no rdf:RDF element");
        return Ok(table);
    };

    for description in rdf.children().filter(|n| is_rdf(*n, "Description")) {
        for (name, property) in fields(description) {
            flatten(&format!("Xmp.{}", name.replacen(':', ".", 1)), &property, &mut table);
        }
    }
    Ok(table)
}

/// Packet bytes as text, without a BOM or trailing NUL padding.
pub(super) fn packet_text(packet: &[u8]) -> Result<&str> {
    let packet = packet.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(packet);
    let end = packet.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    std::str::from_utf8(&packet[..end]).map_err(|e| MetaError::malformed(Standard::Xmp, e.to_string()))
}

/// `(prefix, uri)` pairs declared anywhere in the packet.
pub fn declared_namespaces(packet: &[u8]) -> Vec<(String, String)> {
    let Ok(text) = packet_text(packet) else {
        return Vec::new();
    };
    let Ok(doc) = Document::parse(text) else {
        return Vec::new();
    };
    let mut out: Vec<(String, String)> = Vec::new();
    for node in doc.descendants().filter(|n| n.is_element()) {
        for ns in node.namespaces() {
            if let Some(prefix) = ns.name() {
                if !out.iter().any(|(p, _)| p == prefix) {
                    out.push((prefix.to_string(), ns.uri().to_string()));
                }
            }
        }
    }
    out
}

fn is_rdf(node: Node, name: &str) -> bool {
    node.is_element() && node.tag_name().namespace() == Some(RDF) && node.tag_name().name() == name
}

/// `prefix:name` of a property, preferring the registered prefix.
fn qualified(node: Node, uri: &str, name: &str) -> Option<String> {
    let prefix = namespaces::prefix_for(uri).or_else(|| node.lookup_prefix(uri))?;
    Some(format!("{prefix}:{name}"))
}

/// Properties of a description or struct node: non-RDF attributes first,
/// then child elements.
fn fields(node: Node) -> Vec<(String, Property)> {
    let mut out = Vec::new();
    for attr in node.attributes() {
        let Some(uri) = attr.namespace() else { continue };
        if uri == RDF || uri == XML {
            continue;
        }
        match qualified(node, uri, attr.name()) {
            Some(name) => out.push((name, Property::Text(attr.value().to_string()))),
            None => log::warn!("skipping XMP attribute {} without prefix", attr.name()),
        }
    }
    for child in node.children().filter(|n| n.is_element()) {
        let tag = child.tag_name();
        let Some(uri) = tag.namespace() else {
            log::warn!("skipping XMP element {} without namespace", tag.name());
            continue;
        };
        match qualified(child, uri, tag.name()) {
            Some(name) => out.push((name, property(child))),
            None => log::warn!("skipping XMP element {} without prefix", tag.name()),
        }
    }
    out
}

fn property(node: Node) -> Property {
    if let Some(resource) = node.attribute((RDF, "resource")) {
        return Property::Text(resource.to_string());
    }
    if node.attribute((RDF, "parseType")) == Some("Resource") {
        return Property::Struct(fields(node));
    }

    let first = node.children().find(|n| n.is_element());
    match first {
        Some(child) => {
            let kind = if child.tag_name().namespace() == Some(RDF) {
                ArrayKind::from_name(child.tag_name().name())
            } else {
                None
            };
            match kind {
                Some(kind) => Property::Array(
                    kind,
                    child
                        .children()
                        .filter(|n| is_rdf(*n, "li"))
                        .map(|li| (li.attribute((XML, "lang")).map(str::to_string), property(li)))
                        .collect(),
                ),
                None if is_rdf(child, "Description") => Property::Struct(fields(child)),
                None => Property::Struct(fields(node)),
            }
        }
        None => {
            let has_fields = node
                .attributes()
                .any(|a| a.namespace().is_some_and(|ns| ns != RDF && ns != XML));
            if has_fields {
                Property::Struct(fields(node))
            } else {
                Property::Text(node.text().unwrap_or_default().to_string())
            }
        }
    }
}

fn flatten(key: &str, property: &Property, table: &mut TagTable) {
    match property {
        Property::Text(text) => table.push(TagRecord::new(key, text.as_str(), TypeName::XmpText)),
        Property::Struct(fields) => {
            table.push(TagRecord::new(key, "type=\"Struct\"", TypeName::XmpText));
            for (name, field) in fields {
                flatten(&format!("{key}/{name}"), field, table);
            }
        }
        Property::Array(kind, items) => {
            let simple = items.iter().all(|(_, p)| matches!(p, Property::Text(_)));
            if !simple {
                table.push(TagRecord::new(
                    key,
                    format!("type=\"{}\"", kind.name()),
                    kind.type_name(),
                ));
                for (i, (_, item)) in items.iter().enumerate() {
                    flatten(&format!("{key}[{}]", i + 1), item, table);
                }
                return;
            }

            let texts = items.iter().filter_map(|(lang, p)| match p {
                Property::Text(t) => Some((lang.as_deref(), t.as_str())),
                _ => None,
            });
            if *kind == ArrayKind::Alt && items.iter().any(|(lang, _)| lang.is_some()) {
                let value = texts
                    .map(|(lang, t)| format!("lang=\"{}\" {t}", lang.unwrap_or("x-default")))
                    .collect::<Vec<_>>();
                table.push(TagRecord::new(key, join_array(&value), TypeName::LangAlt));
            } else {
                let value: Vec<&str> = texts.map(|(_, t)| t).collect();
                table.push(TagRecord::new(key, join_array(&value), kind.type_name()));
            }
        }
    }
}
