//! Delivery of a single hit and classification of its outcome.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::Hit;
use crate::network::{HttpResponse, NetworkError, Networking};
use crate::requests::registration_client_id;
use crate::state::RegistrationRecord;
use crate::storage::DataStore;

/// HTTP statuses worth retrying: client timeout, unavailable, gateway timeout.
const RETRYABLE_STATUSES: [u16; 3] = [408, 503, 504];

const HTTP_OK: u16 = 200;

/// Result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// The server answered; the hit is done whatever the status.
    Completed { status: u16 },
    /// No usable answer; the same hit must be attempted again.
    Retry,
}

impl HitOutcome {
    /// Classifies a transport result.
    ///
    /// A response rejected for its size still counts as answered.
    pub fn classify(result: &Result<HttpResponse, NetworkError>) -> Self {
        match result {
            Ok(response) => HitOutcome::from_status(response.status),
            Err(NetworkError::TooLarge { status, .. }) => HitOutcome::from_status(*status),
            Err(_) => HitOutcome::Retry,
        }
    }

    fn from_status(status: u16) -> Self {
        if RETRYABLE_STATUSES.contains(&status) {
            HitOutcome::Retry
        } else {
            HitOutcome::Completed { status }
        }
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, HitOutcome::Retry)
    }
}

/// Sends hits and records completed registrations.
#[derive(Clone)]
pub struct HitProcessor {
    network: Arc<dyn Networking>,
    datastore: Arc<dyn DataStore>,
    retry_interval: Duration,
}

impl HitProcessor {
    pub fn new(
        network: Arc<dyn Networking>,
        datastore: Arc<dyn DataStore>,
        retry_interval: Duration,
    ) -> Self {
        HitProcessor {
            network,
            datastore,
            retry_interval,
        }
    }

    /// Wait before re-attempting a hit that ended in [`HitOutcome::Retry`].
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Performs one delivery attempt.
    pub async fn process(&self, hit: &Hit) -> HitOutcome {
        let result = self.network.connect(hit.to_request()).await;
        let outcome = HitOutcome::classify(&result);

        match outcome {
            HitOutcome::Retry => match &result {
                Err(e) => debug!("Could not send request to ({}): {e}, will retry", hit.url),
                Ok(_) => debug!("Recoverable network error sending to ({}), will retry", hit.url),
            },
            HitOutcome::Completed { status: HTTP_OK } => {
                debug!("Request was sent to ({})", hit.url);
                if hit.is_registration() {
                    self.record_registration(hit);
                }
            }
            HitOutcome::Completed { status } => {
                debug!(
                    "Unrecoverable status {status} from ({}), discarding request",
                    hit.url
                );
            }
        }

        outcome
    }

    fn record_registration(&self, hit: &Hit) {
        let record = RegistrationRecord {
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
            client_id: registration_client_id(&hit.payload),
        };
        if let Err(e) = record.save(self.datastore.as_ref()) {
            warn!("Failed to persist registration record: {e}");
        }
    }
}
