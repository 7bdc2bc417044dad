//! End-to-end checks against images produced by real encoders.

use std::fs;
use std::io::Cursor;

use imgmeta::exif::ifd::{self, ByteOrder, Entry, IfdNode};
use imgmeta::exif::value::FieldType;
use imgmeta::{
    Config, Image, ImageFormat, MetaError, MetadataSet, Standard, TagRecord, TagTable, TagValue,
    TypeName,
};
use tempfile::TempDir;

const FORMATS: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Tiff,
];

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fixture(format: ImageFormat) -> Vec<u8> {
    let pixels = image::RgbImage::from_fn(8, 8, |x, y| {
        image::Rgb([(x * 30) as u8, (y * 30) as u8, 128])
    });
    let target = match format {
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::WebP => image::ImageFormat::WebP,
        ImageFormat::Tiff => image::ImageFormat::Tiff,
    };
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(pixels)
        .write_to(&mut out, target)
        .unwrap();
    out.into_inner()
}

fn open(format: ImageFormat) -> Image {
    let image = Image::from_bytes(fixture(format)).unwrap();
    assert_eq!(image.format().unwrap(), format);
    image
}

fn set(entries: Vec<(&str, TagValue)>) -> MetadataSet {
    entries.into_iter().collect()
}

/// `jpeg` with one extra marker segment right after SOI.
fn with_segment(jpeg: &[u8], marker: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}

fn exif_app1(tiff: &[u8]) -> Vec<u8> {
    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(tiff);
    payload
}

/// The IFD0 entries of the EXIF block in a JPEG.
fn jpeg_ifd0(bytes: &[u8]) -> Vec<Entry> {
    let at = bytes.windows(6).position(|w| w == b"Exif\0\0").unwrap() + 6;
    let tiff = &bytes[at..];
    let (order, offset) = ifd::read_header(tiff).unwrap();
    ifd::read_directory(tiff, offset as usize, order).unwrap().entries
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn assert_decodes(image: &Image) {
    let bytes = image.get_bytes().unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (8, 8));
}

// ── Per-standard round trips ─────────────────────────────────────────

#[test]
fn exif_round_trips_in_every_format() {
    init_logging();
    for format in FORMATS {
        let mut image = open(format);
        image
            .modify_exif(&set(vec![
                ("Exif.Image.Artist", "Jane Doe".into()),
                ("Exif.Image.Orientation", "6".into()),
                ("Exif.Photo.UserComment", "shot at dawn".into()),
            ]))
            .unwrap();

        let reopened = Image::from_bytes(image.get_bytes().unwrap());
        let exif = reopened.unwrap().read_exif().unwrap();
        assert_eq!(exif.get("Exif.Image.Artist"), Some(&"Jane Doe".into()), "{format}");
        assert_eq!(exif.get("Exif.Image.Orientation"), Some(&"6".into()), "{format}");
        assert_eq!(
            exif.get("Exif.Photo.UserComment"),
            Some(&"shot at dawn".into()),
            "{format}"
        );
        assert_decodes(&image);
    }
}

#[test]
fn xmp_round_trips_in_every_format() {
    for format in FORMATS {
        let mut image = open(format);
        let changes = set(vec![
            ("Xmp.dc.subject", vec!["beach", "sunset"].into()),
            ("Xmp.xmp.Rating", "4".into()),
        ]);
        image.modify_xmp(&changes).unwrap();

        let mut reopened = Image::from_bytes(image.get_bytes().unwrap()).unwrap();
        assert_eq!(reopened.read_xmp().unwrap(), changes, "{format}");
        assert!(
            String::from_utf8(reopened.read_raw_xmp().unwrap())
                .unwrap()
                .contains("<rdf:Bag>"),
            "{format}"
        );
        assert_decodes(&image);
    }
}

#[test]
fn iptc_round_trips_where_supported() {
    for format in [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Tiff] {
        let mut image = open(format);
        let changes = set(vec![
            ("Iptc.Application2.Keywords", vec!["tree", "sky"].into()),
            ("Iptc.Application2.Caption", "A tree".into()),
        ]);
        image.modify_iptc(&changes).unwrap();

        let mut reopened = Image::from_bytes(image.get_bytes().unwrap()).unwrap();
        let iptc = reopened.read_iptc().unwrap();
        for (key, value) in changes.iter() {
            assert_eq!(iptc.get(key), Some(value), "{format} {key}");
        }
        // Added whenever application records are written.
        assert_eq!(iptc.get("Iptc.Application2.RecordVersion"), Some(&"4".into()));
    }

    let mut webp = open(ImageFormat::WebP);
    let err = webp
        .modify_iptc(&set(vec![("Iptc.Application2.Caption", "x".into())]))
        .unwrap_err();
    assert!(matches!(err, MetaError::UnsupportedStandard { .. }));
    assert!(webp.read_iptc().unwrap().is_empty());
    webp.clear_iptc().unwrap();
}

#[test]
fn icc_round_trips_in_every_format() {
    let profile: Vec<u8> = (0..=255u8).cycle().take(600).collect();
    for format in FORMATS {
        let mut image = open(format);
        image.modify_icc(&profile).unwrap();
        let reopened = Image::from_bytes(image.get_bytes().unwrap()).unwrap();
        assert_eq!(reopened.read_icc().unwrap(), profile, "{format}");
    }
}

#[test]
fn comment_round_trips_where_supported() {
    for format in [ImageFormat::Jpeg, ImageFormat::Png] {
        let mut image = open(format);
        image.modify_comment("Grüße aus Köln").unwrap();
        let reopened = Image::from_bytes(image.get_bytes().unwrap()).unwrap();
        assert_eq!(reopened.read_comment().unwrap(), "Grüße aus Köln", "{format}");
    }
    for format in [ImageFormat::WebP, ImageFormat::Tiff] {
        let mut image = open(format);
        assert!(matches!(
            image.modify_comment("x").unwrap_err(),
            MetaError::UnsupportedStandard { .. }
        ));
        assert_eq!(image.read_comment().unwrap(), "");
    }
}

// ── Isolation between standards ──────────────────────────────────────

#[test]
fn clearing_one_standard_keeps_the_others() {
    for format in [ImageFormat::Jpeg, ImageFormat::Png] {
        let mut image = open(format);
        let exif = set(vec![("Exif.Image.Make", "Acme".into())]);
        let iptc = set(vec![("Iptc.Application2.City", "Oslo".into())]);
        let xmp = set(vec![("Xmp.dc.creator", vec!["Ann"].into())]);
        image.modify_exif(&exif).unwrap();
        image.modify_iptc(&iptc).unwrap();
        image.modify_xmp(&xmp).unwrap();
        image.modify_comment("note").unwrap();

        image.clear_exif().unwrap();
        assert!(image.read_exif().unwrap().is_empty(), "{format}");
        assert_eq!(
            image.read_iptc().unwrap().get("Iptc.Application2.City"),
            Some(&"Oslo".into()),
            "{format}"
        );
        assert_eq!(image.read_xmp().unwrap(), xmp, "{format}");
        assert_eq!(image.read_comment().unwrap(), "note", "{format}");

        image.clear_xmp().unwrap();
        assert!(image.read_raw_xmp().unwrap().is_empty(), "{format}");
        assert!(
            image.read_iptc().unwrap().contains_key("Iptc.Application2.City"),
            "{format}"
        );
    }
}

#[test]
fn untouched_segments_keep_their_bytes() {
    let mut image = open(ImageFormat::Jpeg);
    image
        .modify_xmp(&set(vec![("Xmp.dc.subject", vec!["a"].into())]))
        .unwrap();
    let packet = image.read_raw_xmp().unwrap();

    image
        .modify_exif(&set(vec![("Exif.Image.Software", "imgmeta".into())]))
        .unwrap();
    image.modify_comment("later").unwrap();
    assert_eq!(image.read_raw_xmp().unwrap(), packet);
}

#[test]
fn tiff_exif_rewrite_keeps_carriers() {
    let mut image = open(ImageFormat::Tiff);
    image
        .modify_xmp(&set(vec![("Xmp.xmp.Label", "Red".into())]))
        .unwrap();
    image
        .modify_exif(&set(vec![("Exif.Image.Make", "Acme".into())]))
        .unwrap();

    let mut reopened = Image::from_bytes(image.get_bytes().unwrap()).unwrap();
    assert_eq!(
        reopened.read_xmp().unwrap().get("Xmp.xmp.Label"),
        Some(&"Red".into())
    );
    assert_eq!(
        reopened.read_exif().unwrap().get("Exif.Image.Make"),
        Some(&"Acme".into())
    );
    assert_decodes(&image);
}

#[test]
fn vendor_exif_bytes_survive_unrelated_edit() {
    init_logging();
    let latin1 = Entry {
        tag: 0x9999,
        field_type: FieldType::Ascii,
        count: 9,
        data: vec![b'N', 0xE4, b'h', b'e', 0, b'f', b'a', b'r', 0],
    };
    let xp = Entry {
        tag: 0x9c9c,
        field_type: FieldType::Byte,
        count: 3,
        data: vec![104, 0, 105],
    };
    let odd = Entry {
        tag: 0x9fff,
        field_type: FieldType::Unknown(77),
        count: 5,
        data: vec![5, 4, 3, 2, 1],
    };
    let tiff = ifd::write_tiff(
        &IfdNode {
            entries: vec![latin1.clone(), xp.clone(), odd.clone()],
            ..Default::default()
        },
        ByteOrder::Big,
    )
    .unwrap();
    let jpeg = with_segment(&fixture(ImageFormat::Jpeg), 0xE1, &exif_app1(&tiff));

    let mut image = Image::from_bytes(jpeg).unwrap();
    image
        .modify_exif(&set(vec![("Exif.Image.Make", "Acme".into())]))
        .unwrap();

    let entries = jpeg_ifd0(&image.get_bytes().unwrap());
    for original in [&latin1, &xp, &odd] {
        assert_eq!(entries.iter().find(|e| e.tag == original.tag), Some(original));
    }
    assert!(entries.iter().any(|e| e.tag == 0x010f && e.data == b"Acme\0"));
    assert_decodes(&image);
}

#[test]
fn foreign_photoshop_resources_survive_iptc_edit() {
    let mut resource = b"8BIM".to_vec();
    resource.extend_from_slice(&0x040Cu16.to_be_bytes());
    resource.extend_from_slice(&[0, 0]);
    resource.extend_from_slice(&2u32.to_be_bytes());
    resource.extend_from_slice(&[9, 9]);
    let mut app13 = b"Photoshop 3.0\0".to_vec();
    app13.extend_from_slice(&resource);
    app13.extend_from_slice(b"Opaque trailing resource data");
    let jpeg = with_segment(&fixture(ImageFormat::Jpeg), 0xED, &app13);

    let mut image = Image::from_bytes(jpeg).unwrap();
    image
        .modify_iptc(&set(vec![("Iptc.Application2.City", "Oslo".into())]))
        .unwrap();

    let bytes = image.get_bytes().unwrap();
    assert!(contains(&bytes, &resource));
    assert!(contains(&bytes, b"Opaque trailing resource data"));
    assert_eq!(
        image.read_iptc().unwrap().get("Iptc.Application2.City"),
        Some(&"Oslo".into())
    );
}

// ── Value shapes ─────────────────────────────────────────────────────

#[test]
fn single_repeatable_iptc_value_reads_as_list() {
    let mut image = open(ImageFormat::Jpeg);
    image
        .modify_iptc(&set(vec![("Iptc.Application2.Keywords", "solo".into())]))
        .unwrap();
    assert_eq!(
        image.read_iptc().unwrap().get("Iptc.Application2.Keywords"),
        Some(&vec!["solo"].into())
    );
}

#[test]
fn bag_table_records_read_back_as_lists() {
    let mut image = open(ImageFormat::Png);
    let mut table = TagTable::new();
    table.push(TagRecord::new("Xmp.dc.subject", "a, b", TypeName::XmpBag));
    image.modify_table(Standard::Xmp, &table).unwrap();

    let stored = image.read_table(Standard::Xmp).unwrap();
    let record = stored.get("Xmp.dc.subject").unwrap();
    assert_eq!(record.value, "a, b");
    assert_eq!(record.type_name, TypeName::XmpBag);
    assert_eq!(
        image.read_xmp().unwrap().get("Xmp.dc.subject"),
        Some(&vec!["a", "b"].into())
    );
}

#[test]
fn empty_list_deletes_a_key() {
    let mut image = open(ImageFormat::Jpeg);
    image
        .modify_xmp(&set(vec![
            ("Xmp.dc.subject", vec!["a"].into()),
            ("Xmp.xmp.Rating", "1".into()),
        ]))
        .unwrap();
    image
        .modify_xmp(&set(vec![("Xmp.dc.subject", TagValue::List(vec![]))]))
        .unwrap();

    let xmp = image.read_xmp().unwrap();
    assert!(!xmp.contains_key("Xmp.dc.subject"));
    assert!(xmp.contains_key("Xmp.xmp.Rating"));
}

// ── Errors and limits ────────────────────────────────────────────────

#[test]
fn unknown_signature_is_unsupported() {
    let err = Image::from_bytes(b"GIF89a not really".to_vec()).unwrap_err();
    assert!(matches!(err, MetaError::UnsupportedFormat(_)));
}

#[test]
fn oversized_jpeg_segment_leaves_image_untouched() {
    let mut image = open(ImageFormat::Jpeg);
    let before = image.get_bytes().unwrap();
    let long = "x".repeat(70_000);
    let err = image
        .modify_xmp(&set(vec![("Xmp.dc.description", long.as_str().into())]))
        .unwrap_err();
    assert!(matches!(err, MetaError::SegmentTooLarge { .. }));
    assert_eq!(image.get_bytes().unwrap(), before);
}

#[test]
fn malformed_exif_leaves_image_untouched() {
    // IFD0 claims 16 entries and holds none.
    let tiff = b"II*\0\x08\0\0\0\x10\0";
    let jpeg = with_segment(&fixture(ImageFormat::Jpeg), 0xE1, &exif_app1(tiff));
    let mut image = Image::from_bytes(jpeg.clone()).unwrap();

    let err = image
        .modify_exif(&set(vec![("Exif.Image.Make", "Acme".into())]))
        .unwrap_err();
    assert!(matches!(err, MetaError::MalformedDirectory { .. }));
    assert_eq!(image.get_bytes().unwrap(), jpeg);

    // Other standards can still be written.
    image.modify_comment("fine").unwrap();
    assert_eq!(image.read_comment().unwrap(), "fine");
}

#[test]
fn xmp_marker_and_index_edges() {
    let mut image = open(ImageFormat::Jpeg);
    image
        .modify_xmp(&set(vec![("Xmp.xmp.Label", "type=\"".into())]))
        .unwrap();
    assert_eq!(
        image.read_xmp().unwrap().get("Xmp.xmp.Label"),
        Some(&"type=\"".into())
    );

    image
        .modify_xmp(&set(vec![("Xmp.dc.subject", vec!["one"].into())]))
        .unwrap();
    let before = image.get_bytes().unwrap();
    for key in ["Xmp.dc.subject[4000000000]", "Xmp.dc.subject[3]"] {
        let err = image
            .modify_xmp(&set(vec![(key, "far".into())]))
            .unwrap_err();
        assert!(matches!(err, MetaError::InvalidKey(_)), "{key}: {err}");
        assert_eq!(image.get_bytes().unwrap(), before, "{key}");
    }
}

#[test]
fn invalid_key_is_rejected() {
    let mut image = open(ImageFormat::Jpeg);
    let err = image
        .modify_exif(&set(vec![("Exif.Nowhere.Thing", "1".into())]))
        .unwrap_err();
    assert!(matches!(err, MetaError::InvalidKey(_)));
}

#[test]
fn closed_image_refuses_calls() {
    let mut image = open(ImageFormat::Png);
    image.close().unwrap();
    assert!(image.read_xmp().unwrap_err().is_closed_handle());
    assert!(image.modify_comment("x").unwrap_err().is_closed_handle());
    assert!(image.locate_segments().unwrap_err().is_closed_handle());
}

// ── Segment locations ────────────────────────────────────────────────

#[test]
fn located_segments_point_at_stored_bytes() {
    let mut image = open(ImageFormat::Jpeg);
    image.modify_comment("find me").unwrap();
    let bytes = image.get_bytes().unwrap();

    let ranges = image.locate_segments().unwrap();
    let comment = ranges
        .iter()
        .find(|r| r.standard == Standard::Comment)
        .unwrap();
    assert_eq!(&bytes[comment.offset..comment.offset + 2], &[0xFF, 0xFE]);
    assert_eq!(
        &bytes[comment.offset + 4..comment.offset + comment.len],
        b"find me"
    );
}

// ── Path-backed images ───────────────────────────────────────────────

#[test]
fn file_is_rewritten_in_place_with_backup() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("photo.webp");
    let original = fixture(ImageFormat::WebP);
    fs::write(&path, &original).unwrap();

    let config = Config {
        backup_originals: true,
        ..Config::default()
    };
    let mut image = Image::open_with_config(&path, &config).unwrap();
    image
        .modify_exif(&set(vec![("Exif.Image.Artist", "Ann".into())]))
        .unwrap();
    image
        .modify_xmp(&set(vec![("Xmp.xmp.Rating", "3".into())]))
        .unwrap();
    image.close().unwrap();

    // The backup holds the file as it was before the first write.
    assert_eq!(fs::read(dir.path().join("photo.webp.bak")).unwrap(), original);

    let mut reopened = Image::open(&path).unwrap();
    assert_eq!(
        reopened.read_exif().unwrap().get("Exif.Image.Artist"),
        Some(&"Ann".into())
    );
    assert_eq!(
        reopened.read_xmp().unwrap().get("Xmp.xmp.Rating"),
        Some(&"3".into())
    );
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn buffer_images_never_touch_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("photo.jpg");
    let original = fixture(ImageFormat::Jpeg);
    fs::write(&path, &original).unwrap();

    let mut image = Image::from_bytes(fs::read(&path).unwrap()).unwrap();
    image.modify_comment("memory only").unwrap();
    assert_eq!(fs::read(&path).unwrap(), original);
}

#[cfg(unix)]
#[test]
fn rewrite_keeps_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("photo.png");
    fs::write(&path, fixture(ImageFormat::Png)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

    let mut image = Image::open(&path).unwrap();
    image
        .modify_xmp(&set(vec![("Xmp.xmp.Rating", "4".into())]))
        .unwrap();
    image.close().unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o640);
}
