//! EXIF tag dictionaries and key parsing.

use crate::error::{MetaError, Result};
use crate::types::TypeName;

/// Directory a tag lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Image,
    Photo,
    GpsInfo,
    Iop,
    Thumbnail,
}

impl Group {
    pub fn name(self) -> &'static str {
        match self {
            Group::Image => "Image",
            Group::Photo => "Photo",
            Group::GpsInfo => "GPSInfo",
            Group::Iop => "Iop",
            Group::Thumbnail => "Thumbnail",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Image" => Some(Group::Image),
            "Photo" => Some(Group::Photo),
            "GPSInfo" => Some(Group::GpsInfo),
            "Iop" => Some(Group::Iop),
            "Thumbnail" => Some(Group::Thumbnail),
            _ => None,
        }
    }

    fn dictionary(self) -> &'static [(u16, &'static str, TypeName)] {
        match self {
            Group::Image | Group::Thumbnail => IMAGE_TAGS,
            Group::Photo => PHOTO_TAGS,
            Group::GpsInfo => GPS_TAGS,
            Group::Iop => IOP_TAGS,
        }
    }
}

pub const TAG_EXIF_IFD: u16 = 0x8769;
pub const TAG_GPS_IFD: u16 = 0x8825;
pub const TAG_IOP_IFD: u16 = 0xA005;
pub const TAG_JPEG_IF: u16 = 0x0201;
pub const TAG_JPEG_IF_LEN: u16 = 0x0202;
pub const TAG_USER_COMMENT: u16 = 0x9286;

/// IFD0 tags that carry other standards' payloads.
pub const TAG_XMP_PACKET: u16 = 0x02BC;
pub const TAG_IPTC_NAA: u16 = 0x83BB;
pub const TAG_ICC_PROFILE: u16 = 0x8773;

/// Windows tags holding UTF-16LE text in a `Byte` field.
pub const UCS2_TAGS: [&str; 5] = [
    "Exif.Image.XPTitle",
    "Exif.Image.XPComment",
    "Exif.Image.XPAuthor",
    "Exif.Image.XPKeywords",
    "Exif.Image.XPSubject",
];

pub fn is_ucs2(key: &str) -> bool {
    UCS2_TAGS.contains(&key)
}

/// Pointer tags never surface as records.
pub fn is_pointer(group: Group, tag: u16) -> bool {
    match group {
        Group::Image => matches!(tag, TAG_EXIF_IFD | TAG_GPS_IFD),
        Group::Photo => tag == TAG_IOP_IFD,
        _ => false,
    }
}

/// IFD0 carriers owned by XMP, IPTC and ICC.
pub fn is_carrier(group: Group, tag: u16) -> bool {
    group == Group::Image && matches!(tag, TAG_XMP_PACKET | TAG_IPTC_NAA | TAG_ICC_PROFILE)
}

pub fn tag_name(group: Group, tag: u16) -> Option<&'static str> {
    group
        .dictionary()
        .iter()
        .find(|(t, _, _)| *t == tag)
        .map(|(_, name, _)| *name)
}

pub fn default_type(group: Group, tag: u16) -> Option<TypeName> {
    group
        .dictionary()
        .iter()
        .find(|(t, _, _)| *t == tag)
        .map(|(_, _, ty)| *ty)
}

/// `Exif.<Group>.<Name>` for a tag, using `0xHHHH` for unknown tags.
pub fn key_for(group: Group, tag: u16) -> String {
    match tag_name(group, tag) {
        Some(name) => format!("Exif.{}.{}", group.name(), name),
        None => format!("Exif.{}.0x{:04x}", group.name(), tag),
    }
}

/// Resolve an `Exif.<Group>.<Name>` key to its group and tag number.
pub fn parse_key(key: &str) -> Result<(Group, u16)> {
    let invalid = || MetaError::InvalidKey(key.to_string());
    let rest = key.strip_prefix("Exif.").ok_or_else(invalid)?;
    let (group, name) = rest.split_once('.').ok_or_else(invalid)?;
    let group = Group::from_name(group).ok_or_else(invalid)?;

    if let Some(hex) = name.strip_prefix("0x") {
        let tag = u16::from_str_radix(hex, 16).map_err(|_| invalid())?;
        return Ok((group, tag));
    }
    group
        .dictionary()
        .iter()
        .find(|(_, n, _)| *n == name)
        .map(|(tag, _, _)| (group, *tag))
        .ok_or_else(invalid)
}

const IMAGE_TAGS: &[(u16, &str, TypeName)] = &[
    (0x000b, "ProcessingSoftware", TypeName::Ascii),
    (0x00fe, "NewSubfileType", TypeName::Long),
    (0x00ff, "SubfileType", TypeName::Short),
    (0x0100, "ImageWidth", TypeName::Long),
    (0x0101, "ImageLength", TypeName::Long),
    (0x0102, "BitsPerSample", TypeName::Short),
    (0x0103, "Compression", TypeName::Short),
    (0x0106, "PhotometricInterpretation", TypeName::Short),
    (0x010a, "FillOrder", TypeName::Short),
    (0x010d, "DocumentName", TypeName::Ascii),
    (0x010e, "ImageDescription", TypeName::Ascii),
    (0x010f, "Make", TypeName::Ascii),
    (0x0110, "Model", TypeName::Ascii),
    (0x0111, "StripOffsets", TypeName::Long),
    (0x0112, "Orientation", TypeName::Short),
    (0x0115, "SamplesPerPixel", TypeName::Short),
    (0x0116, "RowsPerStrip", TypeName::Long),
    (0x0117, "StripByteCounts", TypeName::Long),
    (0x011a, "XResolution", TypeName::Rational),
    (0x011b, "YResolution", TypeName::Rational),
    (0x011c, "PlanarConfiguration", TypeName::Short),
    (0x0128, "ResolutionUnit", TypeName::Short),
    (0x012d, "TransferFunction", TypeName::Short),
    (0x0131, "Software", TypeName::Ascii),
    (0x0132, "DateTime", TypeName::Ascii),
    (0x013b, "Artist", TypeName::Ascii),
    (0x013c, "HostComputer", TypeName::Ascii),
    (0x013d, "Predictor", TypeName::Short),
    (0x013e, "WhitePoint", TypeName::Rational),
    (0x013f, "PrimaryChromaticities", TypeName::Rational),
    (0x0140, "ColorMap", TypeName::Short),
    (0x0142, "TileWidth", TypeName::Long),
    (0x0143, "TileLength", TypeName::Long),
    (0x0144, "TileOffsets", TypeName::Long),
    (0x0145, "TileByteCounts", TypeName::Long),
    (0x014a, "SubIFDs", TypeName::Long),
    (0x0152, "ExtraSamples", TypeName::Short),
    (0x0153, "SampleFormat", TypeName::Short),
    (0x015b, "JPEGTables", TypeName::Undefined),
    (0x0201, "JPEGInterchangeFormat", TypeName::Long),
    (0x0202, "JPEGInterchangeFormatLength", TypeName::Long),
    (0x0211, "YCbCrCoefficients", TypeName::Rational),
    (0x0212, "YCbCrSubSampling", TypeName::Short),
    (0x0213, "YCbCrPositioning", TypeName::Short),
    (0x0214, "ReferenceBlackWhite", TypeName::Rational),
    (0x02bc, "XMLPacket", TypeName::Byte),
    (0x4746, "Rating", TypeName::Short),
    (0x4749, "RatingPercent", TypeName::Short),
    (0x8298, "Copyright", TypeName::Ascii),
    (0x83bb, "IPTCNAA", TypeName::Long),
    (0x8649, "ImageResources", TypeName::Byte),
    (0x8769, "ExifTag", TypeName::Long),
    (0x8773, "InterColorProfile", TypeName::Undefined),
    (0x8825, "GPSTag", TypeName::Long),
    (0x9003, "DateTimeOriginal", TypeName::Ascii),
    (0x9c9b, "XPTitle", TypeName::Byte),
    (0x9c9c, "XPComment", TypeName::Byte),
    (0x9c9d, "XPAuthor", TypeName::Byte),
    (0x9c9e, "XPKeywords", TypeName::Byte),
    (0x9c9f, "XPSubject", TypeName::Byte),
    (0xc612, "DNGVersion", TypeName::Byte),
    (0xc614, "UniqueCameraModel", TypeName::Ascii),
];

const PHOTO_TAGS: &[(u16, &str, TypeName)] = &[
    (0x829a, "ExposureTime", TypeName::Rational),
    (0x829d, "FNumber", TypeName::Rational),
    (0x8822, "ExposureProgram", TypeName::Short),
    (0x8824, "SpectralSensitivity", TypeName::Ascii),
    (0x8827, "ISOSpeedRatings", TypeName::Short),
    (0x8830, "SensitivityType", TypeName::Short),
    (0x8832, "RecommendedExposureIndex", TypeName::Long),
    (0x9000, "ExifVersion", TypeName::Undefined),
    (0x9003, "DateTimeOriginal", TypeName::Ascii),
    (0x9004, "DateTimeDigitized", TypeName::Ascii),
    (0x9010, "OffsetTime", TypeName::Ascii),
    (0x9011, "OffsetTimeOriginal", TypeName::Ascii),
    (0x9012, "OffsetTimeDigitized", TypeName::Ascii),
    (0x9101, "ComponentsConfiguration", TypeName::Undefined),
    (0x9102, "CompressedBitsPerPixel", TypeName::Rational),
    (0x9201, "ShutterSpeedValue", TypeName::SRational),
    (0x9202, "ApertureValue", TypeName::Rational),
    (0x9203, "BrightnessValue", TypeName::SRational),
    (0x9204, "ExposureBiasValue", TypeName::SRational),
    (0x9205, "MaxApertureValue", TypeName::Rational),
    (0x9206, "SubjectDistance", TypeName::Rational),
    (0x9207, "MeteringMode", TypeName::Short),
    (0x9208, "LightSource", TypeName::Short),
    (0x9209, "Flash", TypeName::Short),
    (0x920a, "FocalLength", TypeName::Rational),
    (0x9214, "SubjectArea", TypeName::Short),
    (0x927c, "MakerNote", TypeName::Undefined),
    (0x9286, "UserComment", TypeName::Comment),
    (0x9290, "SubSecTime", TypeName::Ascii),
    (0x9291, "SubSecTimeOriginal", TypeName::Ascii),
    (0x9292, "SubSecTimeDigitized", TypeName::Ascii),
    (0xa000, "FlashpixVersion", TypeName::Undefined),
    (0xa001, "ColorSpace", TypeName::Short),
    (0xa002, "PixelXDimension", TypeName::Long),
    (0xa003, "PixelYDimension", TypeName::Long),
    (0xa004, "RelatedSoundFile", TypeName::Ascii),
    (0xa005, "InteroperabilityTag", TypeName::Long),
    (0xa20b, "FlashEnergy", TypeName::Rational),
    (0xa20e, "FocalPlaneXResolution", TypeName::Rational),
    (0xa20f, "FocalPlaneYResolution", TypeName::Rational),
    (0xa210, "FocalPlaneResolutionUnit", TypeName::Short),
    (0xa214, "SubjectLocation", TypeName::Short),
    (0xa215, "ExposureIndex", TypeName::Rational),
    (0xa217, "SensingMethod", TypeName::Short),
    (0xa300, "FileSource", TypeName::Undefined),
    (0xa301, "SceneType", TypeName::Undefined),
    (0xa302, "CFAPattern", TypeName::Undefined),
    (0xa401, "CustomRendered", TypeName::Short),
    (0xa402, "ExposureMode", TypeName::Short),
    (0xa403, "WhiteBalance", TypeName::Short),
    (0xa404, "DigitalZoomRatio", TypeName::Rational),
    (0xa405, "FocalLengthIn35mmFilm", TypeName::Short),
    (0xa406, "SceneCaptureType", TypeName::Short),
    (0xa407, "GainControl", TypeName::Short),
    (0xa408, "Contrast", TypeName::Short),
    (0xa409, "Saturation", TypeName::Short),
    (0xa40a, "Sharpness", TypeName::Short),
    (0xa40b, "DeviceSettingDescription", TypeName::Undefined),
    (0xa40c, "SubjectDistanceRange", TypeName::Short),
    (0xa420, "ImageUniqueID", TypeName::Ascii),
    (0xa430, "CameraOwnerName", TypeName::Ascii),
    (0xa431, "BodySerialNumber", TypeName::Ascii),
    (0xa432, "LensSpecification", TypeName::Rational),
    (0xa433, "LensMake", TypeName::Ascii),
    (0xa434, "LensModel", TypeName::Ascii),
    (0xa435, "LensSerialNumber", TypeName::Ascii),
    (0xa500, "Gamma", TypeName::Rational),
];

const GPS_TAGS: &[(u16, &str, TypeName)] = &[
    (0x0000, "GPSVersionID", TypeName::Byte),
    (0x0001, "GPSLatitudeRef", TypeName::Ascii),
    (0x0002, "GPSLatitude", TypeName::Rational),
    (0x0003, "GPSLongitudeRef", TypeName::Ascii),
    (0x0004, "GPSLongitude", TypeName::Rational),
    (0x0005, "GPSAltitudeRef", TypeName::Byte),
    (0x0006, "GPSAltitude", TypeName::Rational),
    (0x0007, "GPSTimeStamp", TypeName::Rational),
    (0x0008, "GPSSatellites", TypeName::Ascii),
    (0x0009, "GPSStatus", TypeName::Ascii),
    (0x000a, "GPSMeasureMode", TypeName::Ascii),
    (0x000b, "GPSDOP", TypeName::Rational),
    (0x000c, "GPSSpeedRef", TypeName::Ascii),
    (0x000d, "GPSSpeed", TypeName::Rational),
    (0x000e, "GPSTrackRef", TypeName::Ascii),
    (0x000f, "GPSTrack", TypeName::Rational),
    (0x0010, "GPSImgDirectionRef", TypeName::Ascii),
    (0x0011, "GPSImgDirection", TypeName::Rational),
    (0x0012, "GPSMapDatum", TypeName::Ascii),
    (0x0013, "GPSDestLatitudeRef", TypeName::Ascii),
    (0x0014, "GPSDestLatitude", TypeName::Rational),
    (0x0015, "GPSDestLongitudeRef", TypeName::Ascii),
    (0x0016, "GPSDestLongitude", TypeName::Rational),
    (0x0017, "GPSDestBearingRef", TypeName::Ascii),
    (0x0018, "GPSDestBearing", TypeName::Rational),
    (0x0019, "GPSDestDistanceRef", TypeName::Ascii),
    (0x001a, "GPSDestDistance", TypeName::Rational),
    (0x001b, "GPSProcessingMethod", TypeName::Comment),
    (0x001c, "GPSAreaInformation", TypeName::Comment),
    (0x001d, "GPSDateStamp", TypeName::Ascii),
    (0x001e, "GPSDifferential", TypeName::Short),
];

const IOP_TAGS: &[(u16, &str, TypeName)] = &[
    (0x0001, "InteroperabilityIndex", TypeName::Ascii),
    (0x0002, "InteroperabilityVersion", TypeName::Undefined),
    (0x1000, "RelatedImageFileFormat", TypeName::Ascii),
    (0x1001, "RelatedImageWidth", TypeName::Long),
    (0x1002, "RelatedImageLength", TypeName::Long),
];
