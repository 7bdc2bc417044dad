//! Photoshop image resource blocks (`8BIM`), the wrapper that carries IIM
//! data in JPEG APP13 segments and PNG raw profiles.

use std::ops::Range;

/// Signature at the start of a JPEG APP13 Photoshop segment.
pub const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
pub const SIGNATURE: &[u8] = b"8BIM";
/// Resource id of the IPTC-IIM block.
pub const IPTC_RESOURCE: u16 = 0x0404;

/// Signatures Photoshop and other writers use for resource blocks. Only
/// `8BIM` blocks can hold IPTC data.
const KNOWN_SIGNATURES: [&[u8]; 5] = [SIGNATURE, b"MeSa", b"PHUT", b"AgHg", b"DCSR"];

/// One resource block: its id, the byte range of the whole block and the
/// range of its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub signature: [u8; 4],
    pub id: u16,
    pub block: Range<usize>,
    pub data: Range<usize>,
}

impl Resource {
    pub fn is_iptc(&self) -> bool {
        self.signature == *b"8BIM" && self.id == IPTC_RESOURCE
    }
}

/// Walk the resource blocks in `irb`, returning them with the offset where
/// parsing stopped. Bytes from that offset on are not a resource block.
pub fn walk(irb: &[u8]) -> (Vec<Resource>, usize) {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos + 12 <= irb.len() {
        let signature = [irb[pos], irb[pos + 1], irb[pos + 2], irb[pos + 3]];
        if !KNOWN_SIGNATURES.contains(&&signature[..]) {
            break;
        }
        let id = u16::from_be_bytes([irb[pos + 4], irb[pos + 5]]);
        // Pascal name: length byte + text, padded to even.
        let name_len = irb[pos + 6] as usize;
        let name_padded = if (name_len + 1) % 2 == 0 {
            name_len + 1
        } else {
            name_len + 2
        };
        let size_at = pos + 6 + name_padded;
        if size_at + 4 > irb.len() {
            break;
        }
        let size = u32::from_be_bytes([
            irb[size_at],
            irb[size_at + 1],
            irb[size_at + 2],
            irb[size_at + 3],
        ]) as usize;
        let data_start = size_at + 4;
        let data_end = data_start.saturating_add(size);
        if data_end > irb.len() {
            log::warn!("Photoshop resource 0x{id:04x} runs past the end of its segment");
            break;
        }
        let block_end = (data_end + size % 2).min(irb.len());
        out.push(Resource {
            signature,
            id,
            block: pos..block_end,
            data: data_start..data_end,
        });
        pos = block_end;
    }
    if pos < irb.len() {
        log::debug!("{} trailing bytes after Photoshop resources", irb.len() - pos);
    }
    (out, pos)
}

/// The resource blocks in `irb` up to the first one that cannot be parsed.
pub fn resources(irb: &[u8]) -> Vec<Resource> {
    walk(irb).0
}

/// The IIM bytes of the first IPTC resource, if any.
pub fn find_iptc(irb: &[u8]) -> Option<&[u8]> {
    resources(irb)
        .into_iter()
        .find(Resource::is_iptc)
        .map(|r| &irb[r.data])
}

/// Rebuild the resource blocks with the IPTC resource replaced (or removed
/// when `iptc` is `None`). Every other resource is kept byte-for-byte, and
/// so are any bytes after the last parseable block. The IPTC block goes
/// before those bytes so readers can still reach it.
pub fn replace_iptc(existing: Option<&[u8]>, iptc: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    let mut tail: &[u8] = &[];

    if let Some(irb) = existing {
        let (blocks, end) = walk(irb);
        for resource in blocks {
            if !resource.is_iptc() {
                out.extend_from_slice(&irb[resource.block]);
            }
        }
        tail = &irb[end..];
    }

    if let Some(iim) = iptc.filter(|d| !d.is_empty()) {
        out.extend_from_slice(SIGNATURE);
        out.extend_from_slice(&IPTC_RESOURCE.to_be_bytes());
        out.push(0x00); // empty pascal name
        out.push(0x00); // padding to even
        out.extend_from_slice(&(iim.len() as u32).to_be_bytes());
        out.extend_from_slice(iim);
        if iim.len() % 2 != 0 {
            out.push(0x00);
        }
    }

    out.extend_from_slice(tail);
    out
}
