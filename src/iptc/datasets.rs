//! IIM dataset dictionary.

use crate::error::{MetaError, Result};
use crate::types::TypeName;

pub const ENVELOPE: u8 = 1;
pub const APPLICATION2: u8 = 2;

/// `Iptc.Envelope.CharacterSet`
pub const CHARACTER_SET: (u8, u8) = (1, 90);
/// `Iptc.Application2.RecordVersion`
pub const RECORD_VERSION: (u8, u8) = (2, 0);
/// ISO 2022 escape sequence declaring UTF-8.
pub const UTF8_ESCAPE: &[u8] = b"\x1b%G";

fn record_name(record: u8) -> Option<&'static str> {
    match record {
        ENVELOPE => Some("Envelope"),
        APPLICATION2 => Some("Application2"),
        _ => None,
    }
}

fn record_number(name: &str) -> Option<u8> {
    match name {
        "Envelope" => Some(ENVELOPE),
        "Application2" => Some(APPLICATION2),
        _ => None,
    }
}

fn dictionary(record: u8) -> &'static [(u8, &'static str, TypeName)] {
    match record {
        ENVELOPE => ENVELOPE_DATASETS,
        APPLICATION2 => APPLICATION2_DATASETS,
        _ => &[],
    }
}

pub fn dataset_type(record: u8, dataset: u8) -> TypeName {
    dictionary(record)
        .iter()
        .find(|(d, _, _)| *d == dataset)
        .map(|(_, _, ty)| *ty)
        .unwrap_or(TypeName::IptcString)
}

/// `Iptc.<Record>.<Dataset>`, with `0xHHHH` for unknown parts.
pub fn key_for(record: u8, dataset: u8) -> String {
    let record_part = record_name(record)
        .map(str::to_string)
        .unwrap_or_else(|| format!("0x{record:04x}"));
    let dataset_part = dictionary(record)
        .iter()
        .find(|(d, _, _)| *d == dataset)
        .map(|(_, name, _)| name.to_string())
        .unwrap_or_else(|| format!("0x{dataset:04x}"));
    format!("Iptc.{record_part}.{dataset_part}")
}

/// Resolve an `Iptc.<Record>.<Dataset>` key.
pub fn parse_key(key: &str) -> Result<(u8, u8)> {
    let invalid = || MetaError::InvalidKey(key.to_string());
    let rest = key.strip_prefix("Iptc.").ok_or_else(invalid)?;
    let (record, dataset) = rest.split_once('.').ok_or_else(invalid)?;

    let record = match record.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16).map_err(|_| invalid())?,
        None => record_number(record).ok_or_else(invalid)?,
    };
    let dataset = match dataset.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16).map_err(|_| invalid())?,
        None => dictionary(record)
            .iter()
            .find(|(_, name, _)| *name == dataset)
            .map(|(d, _, _)| *d)
            .ok_or_else(invalid)?,
    };
    Ok((record, dataset))
}

const ENVELOPE_DATASETS: &[(u8, &str, TypeName)] = &[
    (0, "ModelVersion", TypeName::Short),
    (5, "Destination", TypeName::IptcString),
    (20, "FileFormat", TypeName::Short),
    (22, "FileVersion", TypeName::Short),
    (30, "ServiceId", TypeName::IptcString),
    (40, "EnvelopeNumber", TypeName::IptcString),
    (50, "ProductId", TypeName::IptcString),
    (60, "EnvelopePriority", TypeName::IptcString),
    (70, "DateSent", TypeName::Date),
    (80, "TimeSent", TypeName::Time),
    (90, "CharacterSet", TypeName::IptcString),
    (100, "UNO", TypeName::IptcString),
    (120, "ARMId", TypeName::Short),
    (122, "ARMVersion", TypeName::Short),
];

const APPLICATION2_DATASETS: &[(u8, &str, TypeName)] = &[
    (0, "RecordVersion", TypeName::Short),
    (3, "ObjectType", TypeName::IptcString),
    (4, "ObjectAttribute", TypeName::IptcString),
    (5, "ObjectName", TypeName::IptcString),
    (7, "EditStatus", TypeName::IptcString),
    (8, "EditorialUpdate", TypeName::IptcString),
    (10, "Urgency", TypeName::IptcString),
    (12, "Subject", TypeName::IptcString),
    (15, "Category", TypeName::IptcString),
    (20, "SuppCategory", TypeName::IptcString),
    (22, "FixtureId", TypeName::IptcString),
    (25, "Keywords", TypeName::IptcString),
    (26, "LocationCode", TypeName::IptcString),
    (27, "LocationName", TypeName::IptcString),
    (30, "ReleaseDate", TypeName::Date),
    (35, "ReleaseTime", TypeName::Time),
    (37, "ExpirationDate", TypeName::Date),
    (38, "ExpirationTime", TypeName::Time),
    (40, "SpecialInstructions", TypeName::IptcString),
    (42, "ActionAdvised", TypeName::IptcString),
    (45, "ReferenceService", TypeName::IptcString),
    (47, "ReferenceDate", TypeName::Date),
    (50, "ReferenceNumber", TypeName::IptcString),
    (55, "DateCreated", TypeName::Date),
    (60, "TimeCreated", TypeName::Time),
    (62, "DigitizationDate", TypeName::Date),
    (63, "DigitizationTime", TypeName::Time),
    (65, "Program", TypeName::IptcString),
    (70, "ProgramVersion", TypeName::IptcString),
    (75, "ObjectCycle", TypeName::IptcString),
    (80, "Byline", TypeName::IptcString),
    (85, "BylineTitle", TypeName::IptcString),
    (90, "City", TypeName::IptcString),
    (92, "SubLocation", TypeName::IptcString),
    (95, "ProvinceState", TypeName::IptcString),
    (100, "CountryCode", TypeName::IptcString),
    (101, "CountryName", TypeName::IptcString),
    (103, "TransmissionReference", TypeName::IptcString),
    (105, "Headline", TypeName::IptcString),
    (110, "Credit", TypeName::IptcString),
    (115, "Source", TypeName::IptcString),
    (116, "Copyright", TypeName::IptcString),
    (118, "Contact", TypeName::IptcString),
    (120, "Caption", TypeName::IptcString),
    (122, "Writer", TypeName::IptcString),
    (125, "RasterizedCaption", TypeName::Undefined),
    (130, "ImageType", TypeName::IptcString),
    (131, "ImageOrientation", TypeName::IptcString),
    (135, "Language", TypeName::IptcString),
    (150, "AudioType", TypeName::IptcString),
    (151, "AudioRate", TypeName::IptcString),
    (152, "AudioResolution", TypeName::IptcString),
    (153, "AudioDuration", TypeName::IptcString),
    (154, "AudioOutcue", TypeName::IptcString),
    (200, "PreviewFormat", TypeName::Short),
    (201, "PreviewVersion", TypeName::Short),
    (202, "Preview", TypeName::Undefined),
];
