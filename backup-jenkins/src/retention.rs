//! Count-based retention for local archives and remote objects.
//!
//! Callers hand over keys already in chronological order (which, given the
//! archive naming, is plain lexicographic order). Everything but the newest
//! `keep` entries is deleted.

use crate::utils::errors::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::info;

/// Independent keep-counts for local disk and the object store.
///
/// Signed so a negative count in the config file is representable; any
/// count `<= 0` keeps nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub local: i64,
    pub remote: i64,
}

/// Everything in `ordered` except its last `keep` elements, in input order.
pub fn files_to_remove<T>(ordered: &[T], keep: i64) -> &[T] {
    let keep = usize::try_from(keep).unwrap_or(0);
    let cut = ordered.len().saturating_sub(keep);
    &ordered[..cut]
}

/// Delete every element selected by [`files_to_remove`].
///
/// Stops at the first failing deletion; later elements are left untouched.
/// Returns the number of deleted elements.
pub async fn prune<T, F, Fut>(ordered: &[T], keep: i64, mut delete: F) -> Result<usize>
where
    T: AsRef<str>,
    F: FnMut(&T) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let doomed = files_to_remove(ordered, keep);
    for item in doomed {
        info!("Removing {}...", item.as_ref());
        delete(item).await?;
    }
    Ok(doomed.len())
}
