//! HTTP-level tests for the CDN client, backed by a local mock server.

use casc_cdn::{CacheTtl, CdnCache, CdnClient, CdnKind};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CDNS_BODY: &str = "\
Name!STRING:0|Path!STRING:0|Hosts!STRING:0|Region!STRING:0
## seqn = 100
w3|tpr/w3|{host}|us
";

const VERSIONS_BODY: &str = "\
Region!STRING:0|BuildConfig!HEX:16|CDNConfig!HEX:16|BuildId!DEC:4|VersionsName!String:0
## seqn = 200
us|11aa|22bb|1000|1.32.10
eu|11aa|22bb|1000|1.32.10
";

async fn client_for(server: &MockServer, dir: &tempfile::TempDir) -> CdnClient {
    let host = server.address().to_string();
    CdnClient::new("w3", "us")
        .unwrap()
        .with_patch_host(host.clone())
        .with_cache(CdnCache::with_base_dir(dir.path(), "w3"))
}

async fn mount_cdns(server: &MockServer) {
    let body = CDNS_BODY.replace("{host}", &server.address().to_string());
    Mock::given(method("GET"))
        .and(path("/w3/cdns"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn versions_are_parsed_and_cached() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/w3/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(VERSIONS_BODY))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, &dir).await;

    let doc = client.versions().await.unwrap();
    let row = doc.find_row("Region", "us").unwrap();
    assert_eq!(row.get("BuildConfig"), Some("11aa"));
    assert_eq!(row.get("VersionsName"), Some("1.32.10"));

    // Second call must come from the cache; the mock allows one hit only.
    let again = client.versions().await.unwrap();
    assert_eq!(again.len(), 2);
}

#[tokio::test]
async fn ranged_fetch_and_extension() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_cdns(&server).await;

    let content: Vec<u8> = (0u8..=99).collect();

    Mock::given(method("GET"))
        .and(path("/tpr/w3/data/de/ad/deadbeef0011"))
        .and(header("range", "bytes=0-9"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(content[..10].to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tpr/w3/data/de/ad/deadbeef0011"))
        .and(header("range", "bytes=10-19"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(content[10..20].to_vec()))
        .mount(&server)
        .await;

    let mut client = client_for(&server, &dir).await;

    let bytes = client
        .fetch_bytes("deadbeef0011", CdnKind::Data, false, Some(10), CacheTtl::default())
        .await
        .unwrap();
    assert_eq!(bytes, content[..10]);

    // Asking for more grows the cached entry with a follow-up range.
    let bytes = client
        .fetch_bytes("deadbeef0011", CdnKind::Data, false, Some(20), CacheTtl::default())
        .await
        .unwrap();
    assert_eq!(bytes, content[..20]);
}

#[tokio::test]
async fn index_suffix_and_full_fetch() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_cdns(&server).await;

    Mock::given(method("GET"))
        .and(path("/tpr/w3/data/ab/cd/abcdef123456.index"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"index-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server, &dir).await;

    let bytes = client
        .fetch_bytes("abcdef123456", CdnKind::Data, true, None, CacheTtl::Immutable)
        .await
        .unwrap();
    assert_eq!(bytes, b"index-bytes");

    // Immutable entries never refetch.
    let bytes = client
        .fetch_bytes("abcdef123456", CdnKind::Data, true, None, CacheTtl::Immutable)
        .await
        .unwrap();
    assert_eq!(bytes, b"index-bytes");
}

#[tokio::test]
async fn missing_content_maps_to_http_status() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_cdns(&server).await;

    // No data mock mounted: the CDN path 404s.
    let mut client = client_for(&server, &dir).await;
    let err = client
        .fetch_bytes("0000111122223333", CdnKind::Data, false, None, CacheTtl::default())
        .await
        .unwrap_err();
    assert!(matches!(err, casc_cdn::Error::HttpStatus(404)));
}

#[tokio::test]
async fn unknown_region_is_rejected() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_cdns(&server).await;

    let host = server.address().to_string();
    let mut client = CdnClient::new("w3", "xx")
        .unwrap()
        .with_patch_host(host)
        .with_cache(CdnCache::with_base_dir(dir.path(), "w3"));

    let err = client
        .fetch_bytes("0000111122223333", CdnKind::Data, false, None, CacheTtl::default())
        .await
        .unwrap_err();
    assert!(matches!(err, casc_cdn::Error::RegionNotFound { .. }));
}
