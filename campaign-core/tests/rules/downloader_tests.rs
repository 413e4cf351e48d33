//! Tests for rules downloads
//!
//! Scenarios:
//! - A 200 bundle is extracted, cached and installed and its URL persisted
//! - A 304 keeps everything as it was
//! - Failed downloads leave the active rules and persisted URL untouched
//! - Conditional and linkage headers are sent
//! - A bundle that cannot be cached completely is fetched again in full

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use campaign_core::config::{datastore_keys, RULES_CACHE_NAMESPACE};
use campaign_core::network::headers::{IF_MODIFIED_SINCE, IF_NONE_MATCH};
use campaign_core::{
    CacheEntry, CacheError, CacheResult, CacheStore, DataStore, HttpResponse, MemoryCache, MemoryDataStore, MessageAssetDownloader,
    MockNetwork, NetworkError, RulesDownloader, RulesError, RulesOutcome,
};

use super::common::{fullscreen_rules, zip_bundle, RecordingEngine};

const URL: &str = "https://mcias.example.com/camp.example.com/PR123/c1/rules.zip";
const MAX_SIZE: u64 = 1024 * 1024;

struct Fixture {
    network: Arc<MockNetwork>,
    cache: Arc<MemoryCache>,
    datastore: Arc<MemoryDataStore>,
    engine: Arc<RecordingEngine>,
    downloader: RulesDownloader,
}

fn fixture() -> Fixture {
    let network = Arc::new(MockNetwork::new());
    let cache = Arc::new(MemoryCache::new());
    let datastore = Arc::new(MemoryDataStore::new());
    let engine = RecordingEngine::new();
    let timeout = Duration::from_secs(5);
    let assets = MessageAssetDownloader::new(network.clone(), cache.clone(), timeout, MAX_SIZE);
    let downloader = RulesDownloader::new(
        network.clone(),
        cache.clone(),
        datastore.clone(),
        engine.clone(),
        assets,
        timeout,
        MAX_SIZE,
    );
    Fixture {
        network,
        cache,
        datastore,
        engine,
        downloader,
    }
}

fn bundle_response(rules: &[u8]) -> HttpResponse {
    HttpResponse::new(200)
        .with_header("ETag", "\"v1\"")
        .with_header("Last-Modified", "Sun, 06 Nov 1994 08:49:37 GMT")
        .with_body(zip_bundle(&[
            ("rules.json", rules),
            ("assets/banner.html", &b"<html></html>"[..]),
        ]))
}

#[tokio::test]
async fn test_successful_download_installs_rules() {
    let f = fixture();
    f.network.respond(URL, bundle_response(&fullscreen_rules(&[("m1", vec![])])));

    let outcome = f.downloader.load_rules_from_url(URL, None).await.unwrap();

    assert_eq!(outcome, RulesOutcome::Loaded { rules: 1 });
    let active = f.engine.active().unwrap();
    assert_eq!(active.rules[0].consequences[0].id, "m1");

    // Members are cached flat, by file name, with the response token
    let mut keys = f.cache.keys(RULES_CACHE_NAMESPACE).unwrap();
    keys.sort();
    assert_eq!(keys, vec!["banner.html".to_string(), "rules.json".to_string()]);
    let cached = f.cache.get(RULES_CACHE_NAMESPACE, "rules.json").unwrap().unwrap();
    assert_eq!(cached.metadata.etag.as_deref(), Some("\"v1\""));
    assert_eq!(cached.metadata.last_modified, Some(784_111_777_000));

    assert_eq!(
        f.datastore.get_string(datastore_keys::REMOTE_URL).unwrap().as_deref(),
        Some(URL)
    );
    assert_eq!(f.downloader.persisted_url().unwrap().as_deref(), Some(URL));
}

#[tokio::test]
async fn test_second_download_is_conditional() {
    let f = fixture();
    f.network.respond(URL, bundle_response(&fullscreen_rules(&[("m1", vec![])])));
    f.downloader.load_rules_from_url(URL, None).await.unwrap();

    f.network.clear(URL);
    f.network.respond(URL, HttpResponse::new(304));
    let outcome = f.downloader.load_rules_from_url(URL, None).await.unwrap();

    assert_eq!(outcome, RulesOutcome::NotModified);
    let requests = f.network.requests_to(URL);
    assert_eq!(requests.len(), 2);
    assert!(requests[0].header(IF_NONE_MATCH).is_none());
    assert_eq!(requests[1].header(IF_NONE_MATCH), Some("\"v1\""));
    assert_eq!(
        requests[1].header(IF_MODIFIED_SINCE),
        Some("Sun, 06 Nov 1994 08:49:37 GMT")
    );

    // Still exactly one installation
    assert_eq!(f.engine.installs().len(), 1);
    assert!(f.cache.get(RULES_CACHE_NAMESPACE, "rules.json").unwrap().is_some());
}

#[tokio::test]
async fn test_linkage_token_header() {
    let f = fixture();
    f.network.respond(URL, HttpResponse::new(304));

    f.downloader.load_rules_from_url(URL, Some("dG9rZW4=")).await.unwrap();
    f.downloader.load_rules_from_url(URL, None).await.unwrap();

    let requests = f.network.requests_to(URL);
    assert_eq!(requests[0].header("X-InApp-Auth"), Some("dG9rZW4="));
    assert!(requests[1].header("X-InApp-Auth").is_none());
}

#[tokio::test]
async fn test_failures_keep_previous_rules() {
    let f = fixture();
    f.network.respond(URL, bundle_response(&fullscreen_rules(&[("m1", vec![])])));
    f.downloader.load_rules_from_url(URL, None).await.unwrap();

    let other = "https://mcias.example.com/camp.example.com/PR123/c2/rules.zip";
    let failures: Vec<HttpResponse> = vec![
        HttpResponse::new(500),
        HttpResponse::new(404),
        HttpResponse::new(200).with_body(b"not a zip".to_vec()),
        HttpResponse::new(200).with_body(zip_bundle(&[("other.json", b"{}")])),
        HttpResponse::new(200).with_body(zip_bundle(&[("rules.json", b"{not json")])),
    ];

    for response in failures {
        f.network.clear(other);
        f.network.respond(other, response);
        assert!(f.downloader.load_rules_from_url(other, None).await.is_err());
    }
    f.network.clear(other);
    f.network.fail(other, NetworkError::Timeout);
    assert!(matches!(
        f.downloader.load_rules_from_url(other, None).await,
        Err(RulesError::Network(_))
    ));

    assert_eq!(f.engine.installs().len(), 1);
    assert_eq!(f.downloader.persisted_url().unwrap().as_deref(), Some(URL));
    let cached = f.cache.get(RULES_CACHE_NAMESPACE, "rules.json").unwrap().unwrap();
    assert_eq!(cached.metadata.etag.as_deref(), Some("\"v1\""));
}

#[tokio::test]
async fn test_status_error_reports_code() {
    let f = fixture();
    f.network.respond(URL, HttpResponse::new(503));

    assert!(matches!(
        f.downloader.load_rules_from_url(URL, None).await,
        Err(RulesError::Status(503))
    ));
    assert!(f.engine.installs().is_empty());
    assert!(f.downloader.persisted_url().unwrap().is_none());
}

#[tokio::test]
async fn test_empty_url_is_rejected() {
    let f = fixture();

    assert!(matches!(
        f.downloader.load_rules_from_url("", None).await,
        Err(RulesError::EmptyUrl)
    ));
    assert_eq!(f.network.request_count(), 0);
}

#[tokio::test]
async fn test_oversized_bundle_is_rejected() {
    let f = fixture();
    f.network.respond(
        URL,
        HttpResponse::new(200).with_body(vec![0u8; MAX_SIZE as usize + 1]),
    );

    assert!(matches!(
        f.downloader.load_rules_from_url(URL, None).await,
        Err(RulesError::TooLarge { .. })
    ));
}

#[tokio::test]
async fn test_new_bundle_drops_stale_members() {
    let f = fixture();
    f.network.respond(URL, bundle_response(&fullscreen_rules(&[("m1", vec![])])));
    f.downloader.load_rules_from_url(URL, None).await.unwrap();

    f.network.clear(URL);
    f.network.respond(
        URL,
        HttpResponse::new(200).with_body(zip_bundle(&[(
            "rules.json",
            &fullscreen_rules(&[("m2", vec![])]),
        )])),
    );
    f.downloader.load_rules_from_url(URL, None).await.unwrap();

    assert_eq!(
        f.cache.keys(RULES_CACHE_NAMESPACE).unwrap(),
        vec!["rules.json".to_string()]
    );
    assert_eq!(f.engine.active().unwrap().rules[0].consequences[0].id, "m2");
}

#[tokio::test]
async fn test_cached_rules_load_without_network() {
    let f = fixture();
    assert_eq!(f.downloader.load_cached_rules().await.unwrap(), None);

    f.network.respond(URL, bundle_response(&fullscreen_rules(&[("m1", vec![]), ("m2", vec![])])));
    f.downloader.load_rules_from_url(URL, None).await.unwrap();
    let requests = f.network.request_count();

    assert_eq!(f.downloader.load_cached_rules().await.unwrap(), Some(2));
    assert_eq!(f.network.request_count(), requests);
    assert_eq!(f.engine.installs().len(), 2);
}

#[tokio::test]
async fn test_uninstall_and_clear() {
    let f = fixture();
    f.network.respond(URL, bundle_response(&fullscreen_rules(&[("m1", vec![])])));
    f.downloader.load_rules_from_url(URL, None).await.unwrap();

    f.downloader.uninstall_rules();
    f.downloader.clear_cached_rules().unwrap();
    f.downloader.clear_persisted_url().unwrap();

    assert!(f.engine.active().is_none());
    assert!(f.cache.keys(RULES_CACHE_NAMESPACE).unwrap().is_empty());
    assert!(f.downloader.persisted_url().unwrap().is_none());
}

/// Memory cache whose writes of support members fail while `failing` is set.
#[derive(Default)]
struct FailingMemberCache {
    inner: MemoryCache,
    failing: AtomicBool,
}

impl CacheStore for FailingMemberCache {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheResult>, CacheError> {
        self.inner.get(namespace, key)
    }

    fn set(&self, namespace: &str, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        if key == "banner.html" && self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::other("disk full").into());
        }
        self.inner.set(namespace, key, entry)
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        self.inner.remove(namespace, key)
    }

    fn remove_namespace(&self, namespace: &str) -> Result<(), CacheError> {
        self.inner.remove_namespace(namespace)
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>, CacheError> {
        self.inner.keys(namespace)
    }

    fn child_namespaces(&self, parent: &str) -> Result<Vec<String>, CacheError> {
        self.inner.child_namespaces(parent)
    }
}

fn versioned_bundle(etag: &str, message_id: &str) -> HttpResponse {
    HttpResponse::new(200).with_header("ETag", etag).with_body(zip_bundle(&[
        ("rules.json", &fullscreen_rules(&[(message_id, vec![])])[..]),
        ("assets/banner.html", &b"<html></html>"[..]),
    ]))
}

#[tokio::test]
async fn test_partially_cached_bundle_is_fetched_again() {
    let network = Arc::new(MockNetwork::new());
    let cache = Arc::new(FailingMemberCache::default());
    let engine = RecordingEngine::new();
    let timeout = Duration::from_secs(5);
    let assets = MessageAssetDownloader::new(network.clone(), cache.clone(), timeout, MAX_SIZE);
    let downloader = RulesDownloader::new(
        network.clone(),
        cache.clone(),
        Arc::new(MemoryDataStore::new()),
        engine.clone(),
        assets,
        timeout,
        MAX_SIZE,
    );

    network.respond(URL, versioned_bundle("\"v1\"", "old"));
    downloader.load_rules_from_url(URL, None).await.unwrap();

    cache.failing.store(true, Ordering::SeqCst);
    network.clear(URL);
    network.respond(URL, versioned_bundle("\"v2\"", "new"));
    assert!(downloader.load_rules_from_url(URL, None).await.is_err());

    // No definition claims the failed version
    assert!(cache.get(RULES_CACHE_NAMESPACE, "rules.json").unwrap().is_none());
    assert_eq!(engine.active().unwrap().rules[0].consequences[0].id, "old");

    cache.failing.store(false, Ordering::SeqCst);
    let outcome = downloader.load_rules_from_url(URL, None).await.unwrap();

    assert_eq!(outcome, RulesOutcome::Loaded { rules: 1 });
    let requests = network.requests_to(URL);
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].header(IF_NONE_MATCH), Some("\"v1\""));
    assert!(requests[2].header(IF_NONE_MATCH).is_none());
    assert_eq!(engine.active().unwrap().rules[0].consequences[0].id, "new");
    let cached = cache.get(RULES_CACHE_NAMESPACE, "rules.json").unwrap().unwrap();
    assert_eq!(cached.metadata.etag.as_deref(), Some("\"v2\""));
}
