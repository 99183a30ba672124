use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use crate::error::{UploadError, UploadResult};
use crate::store::ObjectStore;
use crate::types::DestinationPath;

/// Allocates a destination path no existing object is stored under.
///
/// The claim is optimistic: the path is checked with a prefix listing and
/// nothing is written to hold it, so a narrow race window exists between the
/// check and the first upload. That is accepted as a best-effort uniqueness
/// guarantee; the storage API offers no conditional write the allocator could
/// use without changing these semantics.
pub struct PathAllocator {
    store: Arc<dyn ObjectStore>,
    max_attempts: u32,
}

impl PathAllocator {
    pub fn new(store: Arc<dyn ObjectStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
        }
    }

    /// Allocate a free destination path under `prefix`.
    ///
    /// Retries with a fresh candidate on every collision, up to the attempt
    /// budget; exhausting it fails with [`UploadError::PathExhausted`]
    /// carrying the last candidate tried.
    pub async fn allocate(&self, prefix: &str) -> UploadResult<DestinationPath> {
        let mut last_candidate = String::new();

        for attempt in 1..=self.max_attempts {
            let candidate = format!("{prefix}{}", random_slug());
            let existing = self.store.list(&candidate).await?;

            if existing.is_empty() {
                return Ok(DestinationPath(candidate));
            }

            debug!(%candidate, attempt, "destination path occupied, retrying");
            last_candidate = candidate;
        }

        Err(UploadError::PathExhausted {
            attempts: self.max_attempts,
            last_candidate,
        })
    }
}

/// Three two-character alphanumeric segments, e.g. `aB/3k/Zx`.
fn random_slug() -> String {
    let mut rng = rand::thread_rng();
    let mut segment = || -> String {
        (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(2)
            .map(char::from)
            .collect()
    };
    format!("{}/{}/{}", segment(), segment(), segment())
}
