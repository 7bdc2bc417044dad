//! IPTC-IIM metadata: `0x1C record dataset length data` datasets.
//!
//! Keys are `Iptc.Envelope.<Name>` (record 1) and
//! `Iptc.Application2.<Name>` (record 2). Dates are exposed as
//! `YYYY-MM-DD` and times as `HH:MM:SS±HH:MM`.

pub mod datasets;
pub mod photoshop;

use crate::codec::Change;
use crate::error::{MetaError, Result};
use crate::types::{Standard, TagRecord, TagTable, TagValue, TypeName};
use datasets::{CHARACTER_SET, RECORD_VERSION, UTF8_ESCAPE};

const MARKER: u8 = 0x1C;

/// Datasets that always read back as lists, even with a single value.
pub const REPEATABLE: [&str; 15] = [
    "Iptc.Envelope.Destination",
    "Iptc.Envelope.ProductId",
    "Iptc.Application2.ObjectAttribute",
    "Iptc.Application2.Subject",
    "Iptc.Application2.SuppCategory",
    "Iptc.Application2.Keywords",
    "Iptc.Application2.LocationCode",
    "Iptc.Application2.LocationName",
    "Iptc.Application2.ReferenceService",
    "Iptc.Application2.ReferenceDate",
    "Iptc.Application2.ReferenceNumber",
    "Iptc.Application2.Byline",
    "Iptc.Application2.BylineTitle",
    "Iptc.Application2.Contact",
    "Iptc.Application2.Writer",
];

struct RawDataset<'a> {
    record: u8,
    dataset: u8,
    data: &'a [u8],
}

fn parse_datasets(data: &[u8]) -> Result<Vec<RawDataset<'_>>> {
    let truncated = |pos: usize| {
        MetaError::malformed(Standard::Iptc, format!("dataset at offset {pos} is truncated"))
    };

    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        if data[pos] != MARKER {
            if data[pos..].iter().all(|&b| b == 0) {
                break;
            }
            return Err(MetaError::malformed(
                Standard::Iptc,
                format!("expected dataset marker at offset {pos}"),
            ));
        }
        let header = data.get(pos..pos + 5).ok_or_else(|| truncated(pos))?;
        let record = header[1];
        let dataset = header[2];
        let short_len = u16::from_be_bytes([header[3], header[4]]);
        let mut start = pos + 5;

        let len = if short_len & 0x8000 != 0 {
            let n = (short_len & 0x7FFF) as usize;
            if n == 0 || n > 4 {
                return Err(MetaError::malformed(
                    Standard::Iptc,
                    format!("unsupported extended length of {n} bytes at offset {pos}"),
                ));
            }
            let bytes = data.get(start..start + n).ok_or_else(|| truncated(pos))?;
            start += n;
            bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize)
        } else {
            short_len as usize
        };

        let end = start.checked_add(len).filter(|&e| e <= data.len());
        let end = end.ok_or_else(|| truncated(pos))?;
        out.push(RawDataset {
            record,
            dataset,
            data: &data[start..end],
        });
        pos = end;
    }
    Ok(out)
}

/// Decode an IIM stream into a tag table.
///
/// Text is UTF-8 when `1:90` declares it or when it is valid UTF-8, and
/// Latin-1 otherwise. Zero padding after the last dataset is accepted.
pub fn decode(data: &[u8]) -> Result<TagTable> {
    let raw = parse_datasets(data)?;
    let declared_utf8 = raw
        .iter()
        .any(|d| (d.record, d.dataset) == CHARACTER_SET && d.data == UTF8_ESCAPE);

    let table: TagTable = raw
        .iter()
        .map(|d| {
            let declared = datasets::dataset_type(d.record, d.dataset);
            let (type_name, value) = value_to_text(declared, d.data, declared_utf8);
            TagRecord::new(datasets::key_for(d.record, d.dataset), value, type_name)
        })
        .collect();
    log::debug!("Decoded {} IPTC datasets", table.len());
    Ok(table)
}

/// Text form of a dataset value. Values that do not match their dataset's
/// type are reported with the type that does describe them, so they
/// re-encode unchanged.
fn value_to_text(type_name: TypeName, data: &[u8], declared_utf8: bool) -> (TypeName, String) {
    let decimal = || {
        data.iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    };
    match type_name {
        TypeName::Short if data.len() == 2 => (
            TypeName::Short,
            u16::from_be_bytes([data[0], data[1]]).to_string(),
        ),
        TypeName::Short | TypeName::Undefined => (TypeName::Undefined, decimal()),
        TypeName::Date => {
            let text = decode_text(data, declared_utf8);
            if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
                let date = format!("{}-{}-{}", &text[0..4], &text[4..6], &text[6..8]);
                (TypeName::Date, date)
            } else {
                (TypeName::IptcString, text)
            }
        }
        TypeName::Time => {
            let text = decode_text(data, declared_utf8);
            match format_time(&text) {
                Some(time) => (TypeName::Time, time),
                None => (TypeName::IptcString, text),
            }
        }
        _ => (TypeName::IptcString, decode_text(data, declared_utf8)),
    }
}

pub(crate) fn decode_text(data: &[u8], declared_utf8: bool) -> String {
    if declared_utf8 {
        return String::from_utf8_lossy(data).into_owned();
    }
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => data.iter().map(|&b| b as char).collect(),
    }
}

/// `HHMMSS±HHMM` → `HH:MM:SS±HH:MM`, `HHMMSS` → `HH:MM:SS`.
fn format_time(text: &str) -> Option<String> {
    if !text.is_ascii() {
        return None;
    }
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    match text.len() {
        6 if digits(text) => Some(format!("{}:{}:{}", &text[0..2], &text[2..4], &text[4..6])),
        11 if digits(&text[0..6])
            && matches!(&text[6..7], "+" | "-")
            && digits(&text[7..11]) =>
        {
            Some(format!(
                "{}:{}:{}{}{}:{}",
                &text[0..2],
                &text[2..4],
                &text[4..6],
                &text[6..7],
                &text[7..9],
                &text[9..11]
            ))
        }
        _ => None,
    }
}

fn parse_date(key: &str, text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| *c != '-').collect();
    if compact.len() == 8 && compact.bytes().all(|b| b.is_ascii_digit()) {
        Ok(compact.into_bytes())
    } else {
        Err(MetaError::invalid_value(key, text))
    }
}

fn parse_time(key: &str, text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| *c != ':').collect();
    if !compact.is_ascii() {
        return Err(MetaError::invalid_value(key, text));
    }
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let out = match compact.len() {
        6 if digits(&compact) => format!("{compact}+0000"),
        11 if digits(&compact[0..6])
            && matches!(&compact[6..7], "+" | "-")
            && digits(&compact[7..11]) =>
        {
            compact
        }
        _ => return Err(MetaError::invalid_value(key, text)),
    };
    Ok(out.into_bytes())
}

fn value_to_bytes(key: &str, type_name: TypeName, text: &str) -> Result<Vec<u8>> {
    match type_name {
        TypeName::Short => text
            .trim()
            .parse::<u16>()
            .map(|v| v.to_be_bytes().to_vec())
            .map_err(|_| MetaError::invalid_value(key, text)),
        TypeName::Date => parse_date(key, text),
        TypeName::Time => parse_time(key, text),
        TypeName::Undefined => text
            .split_whitespace()
            .map(|n| n.parse::<u8>())
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|_| MetaError::invalid_value(key, text)),
        TypeName::IptcString => Ok(text.as_bytes().to_vec()),
        other => Err(MetaError::unsupported_type(key, "an IPTC dataset type", other.as_str())),
    }
}

/// Resolve caller-supplied `str`/`array` records to the dataset's type.
fn resolve_type(type_name: TypeName, record: u8, dataset: u8) -> TypeName {
    match type_name {
        TypeName::Str | TypeName::Array => datasets::dataset_type(record, dataset),
        other => other,
    }
}

fn push_dataset(out: &mut Vec<u8>, record: u8, dataset: u8, data: &[u8]) {
    out.extend_from_slice(&[MARKER, record, dataset]);
    if data.len() < 0x8000 {
        out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    } else {
        out.extend_from_slice(&0x8004u16.to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    }
    out.extend_from_slice(data);
}

/// Encode a tag table as an IIM stream, ordered by record and dataset.
///
/// `Iptc.Application2.RecordVersion` is added when record 2 is present, and
/// `Iptc.Envelope.CharacterSet` is set to UTF-8 when any text is not ASCII.
pub fn encode(table: &TagTable) -> Result<Vec<u8>> {
    let mut items: Vec<(u8, u8, Vec<u8>)> = Vec::with_capacity(table.len() + 2);
    let mut non_ascii = false;

    for record in table {
        let (rec, ds) = datasets::parse_key(&record.key)?;
        let type_name = resolve_type(record.type_name, rec, ds);
        let data = value_to_bytes(&record.key, type_name, &record.value)?;
        if type_name == TypeName::IptcString && !record.value.is_ascii() {
            non_ascii = true;
        }
        items.push((rec, ds, data));
    }

    if non_ascii {
        items.retain(|(r, d, _)| (*r, *d) != CHARACTER_SET);
        items.push((CHARACTER_SET.0, CHARACTER_SET.1, UTF8_ESCAPE.to_vec()));
    }
    let has_record2 = items.iter().any(|(r, _, _)| *r == datasets::APPLICATION2);
    if has_record2 && !items.iter().any(|(r, d, _)| (*r, *d) == RECORD_VERSION) {
        items.push((RECORD_VERSION.0, RECORD_VERSION.1, 4u16.to_be_bytes().to_vec()));
    }
    items.sort_by_key(|(r, d, _)| (*r, *d));

    let mut out = Vec::new();
    for (rec, ds, data) in &items {
        push_dataset(&mut out, *rec, *ds, data);
    }
    log::debug!("Encoded {} IPTC datasets into {} bytes", items.len(), out.len());
    Ok(out)
}

/// Records replacing `change.key` in an IPTC table: one dataset per list
/// element. Raw bytes are accepted only for `Undefined` datasets.
pub fn records_for(change: &Change, stored: Option<TypeName>) -> Result<Vec<TagRecord>> {
    let key = change.key.as_str();
    let (rec, ds) = datasets::parse_key(key)?;
    let type_name = resolve_type(
        change.type_hint.or(stored).unwrap_or(TypeName::Str),
        rec,
        ds,
    );

    let values: Vec<String> = match &change.value {
        TagValue::Text(text) => vec![text.clone()],
        TagValue::List(items) => items.clone(),
        TagValue::Bytes(bytes) => {
            if type_name != TypeName::Undefined {
                return Err(MetaError::unsupported_type(key, type_name.as_str(), "bytes"));
            }
            vec![
                bytes
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(" "),
            ]
        }
    };

    values
        .into_iter()
        .map(|value| {
            value_to_bytes(key, type_name, &value)?;
            Ok(TagRecord::new(key, value, type_name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, &str)]) -> TagTable {
        rows.iter()
            .map(|(k, v)| TagRecord::new(*k, *v, TypeName::Str))
            .collect()
    }

    // ── Decode ───────────────────────────────────────────────────────

    #[test]
    fn decodes_typed_datasets() {
        let mut data = Vec::new();
        push_dataset(&mut data, 2, 0, &[0, 4]);
        push_dataset(&mut data, 2, 25, b"tree");
        push_dataset(&mut data, 2, 25, b"sky");
        push_dataset(&mut data, 2, 55, b"20240131");
        push_dataset(&mut data, 2, 60, b"101500+0100");

        let table = decode(&data).unwrap();
        let rows: Vec<(&str, &str)> =
            table.iter().map(|r| (r.key.as_str(), r.value.as_str())).collect();
        assert_eq!(
            rows,
            vec![
                ("Iptc.Application2.RecordVersion", "4"),
                ("Iptc.Application2.Keywords", "tree"),
                ("Iptc.Application2.Keywords", "sky"),
                ("Iptc.Application2.DateCreated", "2024-01-31"),
                ("Iptc.Application2.TimeCreated", "10:15:00+01:00"),
            ]
        );
    }

    #[test]
    fn latin1_fallback_and_declared_utf8() {
        let mut data = Vec::new();
        push_dataset(&mut data, 2, 120, &[b'c', 0xE9]);
        let table = decode(&data).unwrap();
        assert_eq!(table.get("Iptc.Application2.Caption").unwrap().value, "cé");

        let mut data = Vec::new();
        push_dataset(&mut data, 1, 90, UTF8_ESCAPE);
        push_dataset(&mut data, 2, 120, "cé".as_bytes());
        let table = decode(&data).unwrap();
        assert_eq!(table.get("Iptc.Application2.Caption").unwrap().value, "cé");
    }

    #[test]
    fn extended_length_and_padding() {
        let mut data = Vec::new();
        let long = vec![b'x'; 40_000];
        push_dataset(&mut data, 2, 120, &long);
        data.extend_from_slice(&[0, 0, 0]);
        let table = decode(&data).unwrap();
        assert_eq!(table.get("Iptc.Application2.Caption").unwrap().value.len(), 40_000);
    }

    #[test]
    fn truncated_dataset_is_malformed() {
        let data = [MARKER, 2, 25, 0, 10, b'a', b'b'];
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, MetaError::MalformedDirectory { .. }));

        let err = decode(&[MARKER, 2]).unwrap_err();
        assert!(matches!(err, MetaError::MalformedDirectory { .. }));
    }

    // ── Encode ───────────────────────────────────────────────────────

    #[test]
    fn encode_adds_record_version_and_charset() {
        let input = table(&[
            ("Iptc.Application2.Caption", "Zürich"),
            ("Iptc.Application2.DateCreated", "2024-01-31"),
        ]);
        let bytes = encode(&input).unwrap();
        let output = decode(&bytes).unwrap();

        assert_eq!(output.get("Iptc.Envelope.CharacterSet").unwrap().value, "\u{1b}%G");
        assert_eq!(output.get("Iptc.Application2.RecordVersion").unwrap().value, "4");
        assert_eq!(output.get("Iptc.Application2.Caption").unwrap().value, "Zürich");
        assert_eq!(output.get("Iptc.Application2.DateCreated").unwrap().value, "2024-01-31");
        // Record 1 comes first.
        assert_eq!(output.records()[0].key, "Iptc.Envelope.CharacterSet");
    }

    #[test]
    fn ascii_only_needs_no_charset() {
        let bytes = encode(&table(&[("Iptc.Application2.Headline", "plain")])).unwrap();
        let output = decode(&bytes).unwrap();
        assert!(output.get("Iptc.Envelope.CharacterSet").is_none());
    }

    #[test]
    fn invalid_date_is_rejected() {
        let err = encode(&table(&[("Iptc.Application2.DateCreated", "yesterday")])).unwrap_err();
        assert!(matches!(err, MetaError::InvalidValue { .. }));
    }

    // ── Merge records ────────────────────────────────────────────────

    #[test]
    fn list_becomes_one_record_per_element() {
        let change = Change {
            key: "Iptc.Application2.Keywords".into(),
            value: TagValue::from(vec!["a", "b"]),
            type_hint: None,
        };
        let records = records_for(&change, None).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.type_name == TypeName::IptcString));
    }

    #[test]
    fn bytes_rejected_for_text_dataset() {
        let change = Change {
            key: "Iptc.Application2.Keywords".into(),
            value: TagValue::from(vec![1u8, 2]),
            type_hint: None,
        };
        let err = records_for(&change, None).unwrap_err();
        assert!(matches!(err, MetaError::UnsupportedType { .. }));
    }
}
