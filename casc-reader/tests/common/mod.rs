//! Fixture builders shared by the resolver integration tests.
#![allow(dead_code)]

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;

use casc_format::CKey;

/// Wrap `payload` as a headerless single-chunk BLTE blob.
pub fn blte_raw(payload: &[u8]) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(b"BLTE");
    blob.extend_from_slice(&0u32.to_be_bytes());
    blob.extend_from_slice(payload);
    blob
}

/// Wrap `payload` as a one-chunk zlib-compressed BLTE blob.
pub fn blte_zlib(payload: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    let mut body = vec![b'Z'];
    body.extend_from_slice(&encoder.finish().unwrap());

    let mut blob = Vec::new();
    blob.extend_from_slice(b"BLTE");
    blob.extend_from_slice(&(12u32 + 24).to_be_bytes());
    blob.push(0x0F);
    blob.extend_from_slice(&[0, 0, 1]);
    blob.extend_from_slice(&(body.len() as u32).to_be_bytes());
    blob.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    blob.extend_from_slice(&md5::compute(&body).0);
    blob.extend_from_slice(&body);
    blob
}

/// Build a one-page encoding file mapping each `(ckey, full ekey)` pair.
pub fn encoding_file(entries: &[(CKey, [u8; 16])]) -> Vec<u8> {
    let page_kb = 1u16;
    let mut data = Vec::new();
    data.extend_from_slice(b"EN");
    data.push(1); // version
    data.push(16); // ckey hash size
    data.push(16); // ekey hash size
    data.extend_from_slice(&page_kb.to_be_bytes());
    data.extend_from_slice(&page_kb.to_be_bytes());
    data.extend_from_slice(&1u32.to_be_bytes()); // ckey page count
    data.extend_from_slice(&0u32.to_be_bytes()); // ekey page count
    data.push(0);
    data.extend_from_slice(&0u32.to_be_bytes()); // espec block size

    // Page TOC: first ckey + checksum.
    data.extend_from_slice(entries[0].0.as_bytes());
    data.extend_from_slice(&[0u8; 16]);

    let mut page = Vec::new();
    for (ckey, ekey_full) in entries {
        page.push(1); // one ekey
        page.extend_from_slice(&[0, 0, 0, 0x10, 0]); // declared size, unused here
        page.extend_from_slice(ckey.as_bytes());
        page.extend_from_slice(ekey_full);
    }
    page.resize(page_kb as usize * 1024, 0);
    data.extend_from_slice(&page);
    data
}

/// Build a synthetic `.idx` blob (eks=9, eos=5, ess=4) for `(ekey9,
/// archive, offset, size)` entries.
pub fn idx_file(entries: &[([u8; 9], u16, u64, u32)]) -> Vec<u8> {
    let entry_size = 9 + 5 + 4;
    let mut data = Vec::new();
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&[0, 0]); // bucket, unused
    data.push(4); // ess
    data.push(5); // eos
    data.push(9); // eks
    data.push(0); // archive high byte
    data.push(30); // archive index bits
    data.extend_from_slice(&0u64.to_le_bytes());
    data.extend_from_slice(&[0u8; 7]);
    data.extend_from_slice(&((entries.len() * entry_size) as u32).to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());

    for (ekey, archive, offset, size) in entries {
        let packed = (u64::from(*archive) << 30) | offset;
        data.extend_from_slice(ekey);
        data.extend_from_slice(&packed.to_be_bytes()[3..]);
        data.extend_from_slice(&size.to_be_bytes());
    }
    data
}

/// Build a single-block CDN `.index` blob (eks=9, ess=4, eos=4, bs=1,
/// checksum width 8) for `(ekey9, size, offset)` entries.
pub fn cdn_index_file(entries: &[([u8; 9], u32, u32)]) -> Vec<u8> {
    let checksum_width = 8usize;
    let mut data = Vec::new();
    for (ekey, size, offset) in entries {
        data.extend_from_slice(ekey);
        data.extend_from_slice(&size.to_be_bytes());
        data.extend_from_slice(&offset.to_be_bytes());
    }
    data.resize(1024 - (checksum_width * 2 + 12), 0);
    data.extend_from_slice(&[0u8; 8]); // toc checksum
    data.push(1); // version
    data.extend_from_slice(&[0, 0]);
    data.push(1); // bs
    data.push(4); // eos
    data.push(4); // ess
    data.push(9); // eks
    data.push(checksum_width as u8);
    data.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    data.extend_from_slice(&[0u8; 8]); // footer checksum
    data
}

/// First 9 bytes of a full encoding hash.
pub fn short(ekey_full: &[u8; 16]) -> [u8; 9] {
    let mut s = [0u8; 9];
    s.copy_from_slice(&ekey_full[..9]);
    s
}
