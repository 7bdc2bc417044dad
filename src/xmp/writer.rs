//! Flat tag table → RDF/XML packet.

use super::namespaces::{self, META, RDF};
use super::{ArrayKind, Property, Step, parse_path, reader};
use crate::codec::{marker_kind, split_array};
use crate::error::{MetaError, Result};
use crate::types::{TagRecord, TagTable, TypeName};

const PACKET_ID: &str = "W5M0MpCehiHzreSzNTczkc9d";

/// Serialize `table` as a complete `<?xpacket?>` wrapped packet.
///
/// Namespace URIs are taken from `original` when it declares the prefix,
/// otherwise from the registry. `padding` bytes of whitespace are left
/// before the closing processing instruction for in-place editing.
pub fn encode(table: &TagTable, original: Option<&[u8]>, padding: usize) -> Result<Vec<u8>> {
    let declared = original.map(reader::declared_namespaces).unwrap_or_default();
    let mut used: Vec<(String, String)> = Vec::new();
    let mut root: Vec<(String, Property)> = Vec::new();

    for record in table {
        let (top, steps) = parse_path(&record.key)?;

        let prefixes = std::iter::once(top.as_str()).chain(steps.iter().filter_map(|s| match s {
            Step::Field(name) => Some(name.as_str()),
            Step::Index(_) => None,
        }));
        for qname in prefixes {
            let prefix = qname.split(':').next().unwrap_or_default();
            if used.iter().any(|(p, _)| p == prefix) {
                continue;
            }
            let uri = declared
                .iter()
                .find(|(p, _)| p == prefix)
                .map(|(_, u)| u.clone())
                .or_else(|| namespaces::uri_for(prefix).map(str::to_string))
                .ok_or_else(|| MetaError::InvalidKey(record.key.clone()))?;
            used.push((prefix.to_string(), uri));
        }

        let mut node = slot(&mut root, &top);
        for step in &steps {
            node = descend(node, step, &record.key)?;
        }
        assign(node, record);
    }

    let mut xmp = String::new();
    xmp.push_str(&format!("<?xpacket begin=\"\u{feff}\" id=\"{PACKET_ID}\"?>\n"));
    xmp.push_str(&format!("<x:xmpmeta xmlns:x=\"{META}\">\n"));
    xmp.push_str(&format!(" <rdf:RDF xmlns:rdf=\"{RDF}\">\n"));
    xmp.push_str("  <rdf:Description rdf:about=\"\"");
    for (prefix, uri) in &used {
        xmp.push_str(&format!("\n    xmlns:{prefix}=\"{}\"", xml_escape(uri)));
    }
    xmp.push_str(">\n");
    for (name, property) in &root {
        write_element(&mut xmp, name, None, property, 3);
    }
    xmp.push_str("  </rdf:Description>\n");
    xmp.push_str(" </rdf:RDF>\n");
    xmp.push_str("</x:xmpmeta>\n");

    let mut left = padding;
    while left > 0 {
        let line = left.min(100);
        xmp.push_str(&" ".repeat(line - 1));
        xmp.push('\n');
        left -= line;
    }
    xmp.push_str("<?xpacket end=\"w\"?>");
    Ok(xmp.into_bytes())
}

fn slot<'a>(fields: &'a mut Vec<(String, Property)>, name: &str) -> &'a mut Property {
    let pos = match fields.iter().position(|(n, _)| n == name) {
        Some(pos) => pos,
        None => {
            fields.push((name.to_string(), Property::Text(String::new())));
            fields.len() - 1
        }
    };
    &mut fields[pos].1
}

/// Step into a struct field or array item, turning `node` into the right
/// container first when it is not one yet.
///
/// An index may name an existing item or append one; anything further out
/// is an invalid `key`.
fn descend<'a>(node: &'a mut Property, step: &Step, key: &str) -> Result<&'a mut Property> {
    match (step, node) {
        (Step::Field(name), Property::Struct(fields)) => Ok(slot(fields, name)),
        (Step::Index(index), Property::Array(_, items)) => {
            if *index > items.len() + 1 {
                return Err(MetaError::InvalidKey(key.to_string()));
            }
            if *index == items.len() + 1 {
                items.push((None, Property::Text(String::new())));
            }
            Ok(&mut items[index - 1].1)
        }
        (step, node) => {
            *node = match step {
                Step::Field(_) => Property::Struct(Vec::new()),
                Step::Index(_) => Property::Array(ArrayKind::Seq, Vec::new()),
            };
            descend(node, step, key)
        }
    }
}

fn assign(node: &mut Property, record: &TagRecord) {
    let value = record.value.as_str();
    if let Some(kind) = marker_kind(value) {
        if kind == "Struct" {
            if !matches!(node, Property::Struct(_)) {
                *node = Property::Struct(Vec::new());
            }
            return;
        }
        if let Some(kind) = ArrayKind::from_name(kind) {
            match node {
                Property::Array(existing, _) => *existing = kind,
                _ => *node = Property::Array(kind, Vec::new()),
            }
            return;
        }
    }

    *node = match record.type_name {
        TypeName::LangAlt => Property::Array(ArrayKind::Alt, lang_alternatives(value)),
        TypeName::XmpBag | TypeName::XmpSeq | TypeName::XmpAlt | TypeName::Array => {
            let kind = ArrayKind::from_type(record.type_name).unwrap_or(ArrayKind::Bag);
            Property::Array(
                kind,
                split_array(value)
                    .into_iter()
                    .map(|item| (None, Property::Text(item)))
                    .collect(),
            )
        }
        _ => Property::Text(value.to_string()),
    };
}

/// Parse `lang="x-default" A, lang="de" B`. Text without a language
/// qualifier becomes the default alternative.
fn lang_alternatives(value: &str) -> Vec<(Option<String>, Property)> {
    let Some(rest) = value.strip_prefix("lang=\"") else {
        return vec![(Some("x-default".to_string()), Property::Text(value.to_string()))];
    };
    rest.split(", lang=\"")
        .map(|part| {
            let (lang, text) = match part.split_once("\" ") {
                Some((lang, text)) => (lang, text),
                None => (part.trim_end_matches('"'), ""),
            };
            (Some(lang.to_string()), Property::Text(text.to_string()))
        })
        .collect()
}

fn write_element(out: &mut String, tag: &str, lang: Option<&str>, property: &Property, depth: usize) {
    let indent = " ".repeat(depth);
    let lang = lang
        .map(|l| format!(" xml:lang=\"{}\"", xml_escape(l)))
        .unwrap_or_default();
    match property {
        Property::Text(text) => {
            out.push_str(&format!("{indent}<{tag}{lang}>{}</{tag}>\n", xml_escape(text)));
        }
        Property::Struct(fields) if fields.is_empty() => {
            out.push_str(&format!("{indent}<{tag}{lang} rdf:parseType=\"Resource\"/>\n"));
        }
        Property::Struct(fields) => {
            out.push_str(&format!("{indent}<{tag}{lang} rdf:parseType=\"Resource\">\n"));
            for (name, field) in fields {
                write_element(out, name, None, field, depth + 1);
            }
            out.push_str(&format!("{indent}</{tag}>\n"));
        }
        Property::Array(kind, items) => {
            let container = format!("rdf:{}", kind.name());
            out.push_str(&format!("{indent}<{tag}{lang}>\n"));
            if items.is_empty() {
                out.push_str(&format!("{indent} <{container}/>\n"));
            } else {
                out.push_str(&format!("{indent} <{container}>\n"));
                for (item_lang, item) in items {
                    write_element(out, "rdf:li", item_lang.as_deref(), item, depth + 2);
                }
                out.push_str(&format!("{indent} </{container}>\n"));
            }
            out.push_str(&format!("{indent}</{tag}>\n"));
        }
    }
}

/// Escape special XML characters.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
