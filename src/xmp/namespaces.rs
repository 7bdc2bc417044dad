//! Well-known XMP namespaces and the array type of common properties.

use crate::types::TypeName;

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
pub const META: &str = "adobe:ns:meta/";

/// Registered `(prefix, uri)` pairs. Keys always use these prefixes, no
/// matter what prefix a packet declares for the same URI.
pub const REGISTRY: &[(&str, &str)] = &[
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("xmp", "http://ns.adobe.com/xap/1.0/"),
    ("xmpRights", "http://ns.adobe.com/xap/1.0/rights/"),
    ("xmpMM", "http://ns.adobe.com/xap/1.0/mm/"),
    ("xmpBJ", "http://ns.adobe.com/xap/1.0/bj/"),
    ("xmpTPg", "http://ns.adobe.com/xap/1.0/t/pg/"),
    ("xmpDM", "http://ns.adobe.com/xmp/1.0/DynamicMedia/"),
    ("xmpidq", "http://ns.adobe.com/xmp/Identifier/qual/1.0/"),
    ("xmpNote", "http://ns.adobe.com/xmp/note/"),
    ("pdf", "http://ns.adobe.com/pdf/1.3/"),
    ("photoshop", "http://ns.adobe.com/photoshop/1.0/"),
    ("crs", "http://ns.adobe.com/camera-raw-settings/1.0/"),
    ("tiff", "http://ns.adobe.com/tiff/1.0/"),
    ("exif", "http://ns.adobe.com/exif/1.0/"),
    ("exifEX", "http://cipa.jp/exif/1.0/"),
    ("aux", "http://ns.adobe.com/exif/1.0/aux/"),
    ("lr", "http://ns.adobe.com/lightroom/1.0/"),
    ("Iptc4xmpCore", "http://iptc.org/std/Iptc4xmpCore/1.0/xmlns/"),
    ("Iptc4xmpExt", "http://iptc.org/std/Iptc4xmpExt/2008-02-29/"),
    ("plus", "http://ns.useplus.org/ldf/xmp/1.0/"),
    ("stEvt", "http://ns.adobe.com/xap/1.0/sType/ResourceEvent#"),
    ("stRef", "http://ns.adobe.com/xap/1.0/sType/ResourceRef#"),
    ("stDim", "http://ns.adobe.com/xap/1.0/sType/Dimensions#"),
    ("stVer", "http://ns.adobe.com/xap/1.0/sType/Version#"),
    ("stJob", "http://ns.adobe.com/xap/1.0/sType/Job#"),
    ("stArea", "http://ns.adobe.com/xmp/sType/Area#"),
    ("mwg-rs", "http://www.metadataworkinggroup.com/schemas/regions/"),
    ("digiKam", "http://www.digikam.org/ns/1.0/"),
    ("MicrosoftPhoto", "http://ns.microsoft.com/photo/1.0/"),
    ("GPano", "http://ns.google.com/photos/1.0/panorama/"),
];

pub fn prefix_for(uri: &str) -> Option<&'static str> {
    REGISTRY.iter().find(|(_, u)| *u == uri).map(|(p, _)| *p)
}

pub fn uri_for(prefix: &str) -> Option<&'static str> {
    REGISTRY.iter().find(|(p, _)| *p == prefix).map(|(_, u)| *u)
}

/// Type of well-known array and language-alternative properties.
const KNOWN_TYPES: &[(&str, TypeName)] = &[
    ("Xmp.dc.contributor", TypeName::XmpBag),
    ("Xmp.dc.creator", TypeName::XmpSeq),
    ("Xmp.dc.date", TypeName::XmpSeq),
    ("Xmp.dc.description", TypeName::LangAlt),
    ("Xmp.dc.language", TypeName::XmpBag),
    ("Xmp.dc.publisher", TypeName::XmpBag),
    ("Xmp.dc.relation", TypeName::XmpBag),
    ("Xmp.dc.rights", TypeName::LangAlt),
    ("Xmp.dc.subject", TypeName::XmpBag),
    ("Xmp.dc.title", TypeName::LangAlt),
    ("Xmp.dc.type", TypeName::XmpBag),
    ("Xmp.xmp.Identifier", TypeName::XmpBag),
    ("Xmp.xmpRights.Owner", TypeName::XmpBag),
    ("Xmp.xmpRights.UsageTerms", TypeName::LangAlt),
    ("Xmp.photoshop.SupplementalCategories", TypeName::XmpBag),
    ("Xmp.lr.hierarchicalSubject", TypeName::XmpBag),
    ("Xmp.Iptc4xmpCore.Scene", TypeName::XmpBag),
    ("Xmp.Iptc4xmpCore.SubjectCode", TypeName::XmpBag),
    ("Xmp.Iptc4xmpExt.PersonInImage", TypeName::XmpBag),
    ("Xmp.digiKam.TagsList", TypeName::XmpSeq),
    ("Xmp.MicrosoftPhoto.LastKeywordXMP", TypeName::XmpBag),
    ("Xmp.exif.ISOSpeedRatings", TypeName::XmpSeq),
    ("Xmp.exif.ComponentsConfiguration", TypeName::XmpSeq),
    ("Xmp.exif.SubjectArea", TypeName::XmpSeq),
    ("Xmp.exif.UserComment", TypeName::LangAlt),
    ("Xmp.tiff.BitsPerSample", TypeName::XmpSeq),
    ("Xmp.tiff.ImageDescription", TypeName::LangAlt),
    ("Xmp.tiff.Copyright", TypeName::LangAlt),
    ("Xmp.tiff.Artist", TypeName::XmpSeq),
];

pub fn known_type(key: &str) -> Option<TypeName> {
    KNOWN_TYPES.iter().find(|(k, _)| *k == key).map(|(_, t)| *t)
}
