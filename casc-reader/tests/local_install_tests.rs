//! End-to-end tests over a synthetic local installation.

mod common;

use std::fs;
use std::path::Path;

use casc_format::CKey;
use casc_reader::{CascReader, DataSource, Error, LocalCascReader};
use common::{blte_raw, blte_zlib, encoding_file, idx_file, short};
use pretty_assertions::assert_eq;

const FILE_PAYLOAD: &[u8] = b"Hello, Azeroth! This is the footman's file.";

struct Fixture {
    enc_ckey: CKey,
    file_ckey: CKey,
    root_ckey: CKey,
}

/// Lay out a minimal but complete installation:
/// one archive holding the encoding file, the root, and one game file.
fn build_install(dir: &Path) -> Fixture {
    let enc_ckey = CKey::new([0xE0; 16]);
    let enc_ekey_full = [0xE1; 16];
    let root_ckey = CKey::new([0x50; 16]);
    let root_ekey_full = [0x51; 16];
    let file_ckey = CKey::new([0xF0; 16]);
    let file_ekey_full = [0xF1; 16];

    let root_text = format!("units\\human\\footman.txt|{file_ckey}|0|0\n");
    let root_blob = blte_raw(root_text.as_bytes());
    let file_blob = blte_zlib(FILE_PAYLOAD);
    let enc_blob = blte_raw(&encoding_file(&[
        (root_ckey, root_ekey_full),
        (file_ckey, file_ekey_full),
    ]));

    // Archive: encoding, then root, then the file.
    let mut archive = Vec::new();
    let enc_offset = 0u64;
    archive.extend_from_slice(&enc_blob);
    let root_offset = archive.len() as u64;
    archive.extend_from_slice(&root_blob);
    let file_offset = archive.len() as u64;
    archive.extend_from_slice(&file_blob);

    let data_dir = dir.join("Data").join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("data.001"), &archive).unwrap();
    fs::write(
        data_dir.join("0e00000000.idx"),
        idx_file(&[
            (short(&enc_ekey_full), 1, enc_offset, enc_blob.len() as u32),
            (short(&root_ekey_full), 1, root_offset, root_blob.len() as u32),
            (short(&file_ekey_full), 1, file_offset, file_blob.len() as u32),
        ]),
    )
    .unwrap();

    let build_key = "11223344556677889900112233445566";
    let config_dir = dir
        .join("Data")
        .join("config")
        .join(&build_key[..2])
        .join(&build_key[2..4]);
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join(build_key),
        format!(
            "# Build Configuration\n\
             root = {root_ckey}\n\
             install = {install} 100\n\
             download = {download} 100\n\
             size = {size} 100\n\
             encoding = {enc_ckey} {enc_ekey} 1000 1000\n\
             build-uid = w3\n",
            install = "aa".repeat(16),
            download = "bb".repeat(16),
            size = "cc".repeat(16),
            enc_ekey = hex::encode(enc_ekey_full),
        ),
    )
    .unwrap();

    fs::write(
        dir.join(".build.info"),
        format!(
            "Build Key!HEX:16|CDN Key!HEX:16|Version!STRING:0|Tags!STRING:0|Product!STRING:0|Active!DEC:1\n\
             {build_key}|{cdn_key}|1.32.10.18820|ship|w3|1\n",
            cdn_key = "dd".repeat(16),
        ),
    )
    .unwrap();

    Fixture {
        enc_ckey,
        file_ckey,
        root_ckey,
    }
}

#[tokio::test]
async fn resolves_a_synthetic_install() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = build_install(dir.path());
    let mut reader = LocalCascReader::open(dir.path()).unwrap();

    // Named listing carries the root entry and the synthetic manifests.
    let files = reader.list_files();
    assert!(files.iter().any(|(n, c)| n == "_ENCODING" && *c == fixture.enc_ckey));
    assert!(files.iter().any(|(n, c)| n == "_ROOT" && *c == fixture.root_ckey));
    assert!(
        files
            .iter()
            .any(|(n, c)| n == "units\\human\\footman.txt" && *c == fixture.file_ckey)
    );

    // The game file round-trips through index, archive, and BLTE.
    let payload = reader.get_file(&fixture.file_ckey, None).await.unwrap().unwrap();
    assert_eq!(payload, FILE_PAYLOAD);

    // The encoding file resolves through its patched-in bootstrap mapping.
    let enc_payload = reader.get_file(&fixture.enc_ckey, None).await.unwrap().unwrap();
    assert_eq!(&enc_payload[..2], b"EN");

    assert_eq!(
        reader.get_name(&fixture.file_ckey).as_deref(),
        Some("units\\human\\footman.txt")
    );
}

#[tokio::test]
async fn sizes_match_payloads_and_are_memoized() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = build_install(dir.path());
    let mut reader = LocalCascReader::open(dir.path()).unwrap();

    let size = reader.get_file_size(&fixture.file_ckey).await.unwrap().unwrap();
    let payload = reader.get_file(&fixture.file_ckey, None).await.unwrap().unwrap();
    assert_eq!(size, payload.len() as u64);
    assert_eq!(
        reader.get_chunk_count(&fixture.file_ckey).await.unwrap(),
        Some(1)
    );

    let info = reader.get_file_info(&fixture.file_ckey).unwrap();
    assert!(info.sizes_known());
    assert_eq!(info.uncompressed_size, Some(size));
    assert_eq!(info.data_file, Some(DataSource::Local(1)));

    // Decoding twice yields identical bytes.
    let again = reader.get_file(&fixture.file_ckey, None).await.unwrap().unwrap();
    assert_eq!(payload, again);
}

#[tokio::test]
async fn limits_and_missing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = build_install(dir.path());
    let mut reader = LocalCascReader::open(dir.path()).unwrap();

    let prefix = reader
        .get_file(&fixture.file_ckey, Some(5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prefix, &FILE_PAYLOAD[..5]);

    let empty = reader
        .get_file(&fixture.file_ckey, Some(0))
        .await
        .unwrap()
        .unwrap();
    assert!(empty.is_empty());

    let missing = CKey::new([0x99; 16]);
    assert!(reader.get_file(&missing, None).await.unwrap().is_none());
    assert!(reader.get_file_info(&missing).is_none());
    assert!(reader.get_file_size(&missing).await.unwrap().is_none());
    assert!(!reader.is_file_fetchable(&missing, true).await);

    assert!(reader.is_file_fetchable(&fixture.file_ckey, false).await);
}

#[tokio::test]
async fn named_and_unnamed_listings_are_disjoint() {
    let dir = tempfile::tempdir().unwrap();
    let _fixture = build_install(dir.path());
    let reader = LocalCascReader::open(dir.path()).unwrap();

    let named: Vec<CKey> = reader.list_files().iter().map(|(_, c)| *c).collect();
    for (ckey, _) in reader.list_unnamed_files() {
        assert!(!named.contains(&ckey));
    }
}

#[test]
fn rejects_a_directory_that_is_not_an_install() {
    let dir = tempfile::tempdir().unwrap();
    let err = LocalCascReader::open(dir.path()).unwrap_err();
    assert!(matches!(err, Error::InvalidInstall(_)));
}
