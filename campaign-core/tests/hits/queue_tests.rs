//! Tests for hit delivery
//!
//! Scenarios:
//! - Hits are delivered in insertion order
//! - Recoverable failures block the queue until a retry succeeds
//! - Terminal statuses drop the hit
//! - Privacy changes suspend, resume and purge
//! - A delivered hit is never sent again while its removal fails

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use campaign_core::storage::StoredRecord;
use campaign_core::{
    Hit, HitProcessor, HitQueue, HitStore, HttpResponse, MemoryDataStore, MemoryHitStore,
    MockNetwork, NetworkError, PrivacyStatus, StorageError,
};

use super::common::{eventually, init_tracing};

const RETRY: Duration = Duration::from_secs(30);

struct Fixture {
    network: Arc<MockNetwork>,
    store: Arc<MemoryHitStore>,
    queue: HitQueue,
}

fn fixture() -> Fixture {
    init_tracing();
    let network = Arc::new(MockNetwork::new());
    let store = Arc::new(MemoryHitStore::new());
    let processor = HitProcessor::new(network.clone(), Arc::new(MemoryDataStore::new()), RETRY);
    let queue = HitQueue::new(store.clone(), processor);
    Fixture {
        network,
        store,
        queue,
    }
}

#[tokio::test(start_paused = true)]
async fn test_queue_starts_suspended() {
    let f = fixture();
    f.network.respond("https://a/1", HttpResponse::new(200));

    f.queue.queue(&Hit::new("https://a/1", "", 5)).unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(f.queue.is_suspended());
    assert_eq!(f.network.request_count(), 0);
    assert_eq!(f.queue.count().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hits_delivered_in_order() {
    let f = fixture();
    for url in ["https://a/1", "https://a/2", "https://a/3"] {
        f.network.respond(url, HttpResponse::new(200));
        f.queue.queue(&Hit::new(url, "", 5)).unwrap();
    }

    f.queue.begin_processing();
    assert!(eventually(|| f.store.records().is_empty()).await);

    let urls: Vec<String> = f.network.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec!["https://a/1", "https://a/2", "https://a/3"]);
}

#[tokio::test(start_paused = true)]
async fn test_connection_failure_blocks_until_retry_succeeds() {
    let f = fixture();
    f.network.fail("https://a/1", NetworkError::Timeout);
    f.network.respond("https://a/1", HttpResponse::new(200));
    f.network.respond("https://a/2", HttpResponse::new(200));

    f.queue.queue(&Hit::new("https://a/1", "", 5)).unwrap();
    f.queue.queue(&Hit::new("https://a/2", "", 5)).unwrap();
    f.queue.begin_processing();

    assert!(eventually(|| f.network.request_count() == 1).await);
    // Nothing behind the failed hit goes out before the retry interval
    tokio::time::advance(RETRY / 2).await;
    assert_eq!(f.network.request_count(), 1);
    assert_eq!(f.queue.count().unwrap(), 2);

    assert!(eventually(|| f.store.records().is_empty()).await);
    let urls: Vec<String> = f.network.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec!["https://a/1", "https://a/1", "https://a/2"]);
}

#[tokio::test(start_paused = true)]
async fn test_retryable_statuses_are_retried() {
    for status in [408, 503, 504] {
        let f = fixture();
        f.network.respond("https://a/1", HttpResponse::new(status));
        f.network.respond("https://a/1", HttpResponse::new(200));

        f.queue.queue(&Hit::new("https://a/1", "", 5)).unwrap();
        f.queue.begin_processing();

        assert!(eventually(|| f.store.records().is_empty()).await);
        assert_eq!(f.network.request_count(), 2, "status {status}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_terminal_status_drops_hit() {
    let f = fixture();
    f.network.respond("https://a/1", HttpResponse::new(404));
    f.network.respond("https://a/2", HttpResponse::new(200));

    f.queue.queue(&Hit::new("https://a/1", "", 5)).unwrap();
    f.queue.queue(&Hit::new("https://a/2", "", 5)).unwrap();
    f.queue.begin_processing();

    assert!(eventually(|| f.store.records().is_empty()).await);
    assert_eq!(f.network.requests_to("https://a/1").len(), 1);
    assert_eq!(f.network.requests_to("https://a/2").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hit_queued_while_processing_is_delivered() {
    let f = fixture();
    f.queue.begin_processing();
    tokio::time::sleep(Duration::from_secs(1)).await;

    f.network.respond("https://a/late", HttpResponse::new(200));
    f.queue.queue(&Hit::new("https://a/late", "", 5)).unwrap();

    assert!(eventually(|| f.network.request_count() == 1).await);
    assert!(eventually(|| f.store.records().is_empty()).await);
}

#[tokio::test(start_paused = true)]
async fn test_payload_hits_are_posted() {
    let f = fixture();
    f.network.respond("https://a/reg", HttpResponse::new(200));
    f.network.respond("https://a/track", HttpResponse::new(200));

    f.queue
        .queue(&Hit::new("https://a/reg", r#"{"marketingCloudId":"c1"}"#, 5))
        .unwrap();
    f.queue.queue(&Hit::new("https://a/track", "", 5)).unwrap();
    f.queue.begin_processing();
    assert!(eventually(|| f.store.records().is_empty()).await);

    let regs = f.network.requests_to("https://a/reg");
    let reg = &regs[0];
    assert_eq!(reg.method, campaign_core::HttpMethod::Post);
    assert_eq!(reg.header("content-type"), Some("application/json"));
    assert_eq!(reg.timeout, Duration::from_secs(5));

    let tracks = f.network.requests_to("https://a/track");
    let track = &tracks[0];
    assert_eq!(track.method, campaign_core::HttpMethod::Get);
    assert!(track.body.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_privacy_changes() {
    let f = fixture();
    f.network.respond("https://a/1", HttpResponse::new(200));
    f.queue.queue(&Hit::new("https://a/1", "", 5)).unwrap();

    f.queue.handle_privacy_change(PrivacyStatus::Unknown).unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(f.network.request_count(), 0);
    assert_eq!(f.queue.count().unwrap(), 1);

    f.queue.handle_privacy_change(PrivacyStatus::OptOut).unwrap();
    assert!(f.queue.is_suspended());
    assert_eq!(f.queue.count().unwrap(), 0);

    f.queue.queue(&Hit::new("https://a/1", "", 5)).unwrap();
    f.queue.handle_privacy_change(PrivacyStatus::OptIn).unwrap();
    assert!(!f.queue.is_suspended());
    assert!(eventually(|| f.store.records().is_empty()).await);
    assert_eq!(f.network.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_suspend_keeps_pending_hits() {
    let f = fixture();
    f.network.fail("https://a/1", NetworkError::ConnectionFailed("down".into()));
    f.queue.queue(&Hit::new("https://a/1", "", 5)).unwrap();
    f.queue.begin_processing();
    assert!(eventually(|| f.network.request_count() == 1).await);

    f.queue.suspend();
    tokio::time::sleep(RETRY * 3).await;

    assert_eq!(f.network.request_count(), 1);
    assert_eq!(f.queue.count().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_purged_hit_does_not_delay_new_hits() {
    let f = fixture();
    f.network.fail("https://a/1", NetworkError::Timeout);
    f.queue.queue(&Hit::new("https://a/1", "", 5)).unwrap();
    f.queue.begin_processing();
    assert!(eventually(|| f.network.request_count() == 1).await);

    f.queue.handle_privacy_change(PrivacyStatus::OptOut).unwrap();
    f.network.respond("https://a/2", HttpResponse::new(200));
    f.queue.queue(&Hit::new("https://a/2", "", 5)).unwrap();
    f.queue.handle_privacy_change(PrivacyStatus::OptIn).unwrap();

    // Well inside the retry interval of the purged hit
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(f.network.requests_to("https://a/2").len(), 1);
    assert!(f.store.records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_oversized_answer_completes_hit() {
    let f = fixture();
    f.network.fail(
        "https://a/1",
        NetworkError::TooLarge {
            status: 200,
            size: 10,
            max: 5,
        },
    );
    f.queue.queue(&Hit::new("https://a/1", "", 5)).unwrap();
    f.queue.begin_processing();

    assert!(eventually(|| f.store.records().is_empty()).await);
    tokio::time::sleep(RETRY * 2).await;
    assert_eq!(f.network.request_count(), 1);
}

/// Hit store whose removals fail while `failing` is set.
#[derive(Default)]
struct StuckHitStore {
    inner: MemoryHitStore,
    failing: AtomicBool,
}

impl HitStore for StuckHitStore {
    fn append(&self, data: &str) -> Result<i64, StorageError> {
        self.inner.append(data)
    }

    fn peek(&self) -> Result<Option<StoredRecord>, StorageError> {
        self.inner.peek()
    }

    fn remove(&self, id: i64) -> Result<bool, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.inner.remove(id)
    }

    fn clear(&self) -> Result<usize, StorageError> {
        self.inner.clear()
    }

    fn count(&self) -> Result<usize, StorageError> {
        self.inner.count()
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_removal_does_not_resend_hit() {
    init_tracing();
    let network = Arc::new(MockNetwork::new());
    let store = Arc::new(StuckHitStore::default());
    store.failing.store(true, Ordering::SeqCst);
    let processor = HitProcessor::new(network.clone(), Arc::new(MemoryDataStore::new()), RETRY);
    let queue = HitQueue::new(store.clone(), processor);
    network.respond("https://a/1", HttpResponse::new(200));

    queue.queue(&Hit::new("https://a/1", "", 5)).unwrap();
    queue.begin_processing();
    assert!(eventually(|| network.request_count() == 1).await);

    tokio::time::sleep(RETRY * 3).await;
    assert_eq!(network.request_count(), 1);
    assert_eq!(queue.count().unwrap(), 1);

    // Only the removal is retried once the store recovers
    store.failing.store(false, Ordering::SeqCst);
    assert!(eventually(|| store.inner.records().is_empty()).await);
    assert_eq!(network.request_count(), 1);
}
