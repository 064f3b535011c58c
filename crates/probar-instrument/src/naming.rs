//! Recorder name generation.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Process-wide counter distinguishing names generated in one process.
static NEXT_RECORDER: AtomicU64 = AtomicU64::new(0);

/// Hex digits of the session id kept in a recorder name.
const SESSION_ID_LEN: usize = 12;

/// Generate a fresh session id: 12 lowercase hex digits of a v4 UUID.
#[must_use]
pub fn session_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(SESSION_ID_LEN);
    id
}

/// Generate a recorder name of the form `____<session-id>_<counter>____`.
///
/// # Example
///
/// ```rust
/// use probar_instrument::naming::recorder_name;
///
/// let name = recorder_name("0123456789ab");
/// assert!(name.starts_with("____0123456789ab_"));
/// assert!(name.ends_with("____"));
/// ```
#[must_use]
pub fn recorder_name(session_id: &str) -> String {
    let n = NEXT_RECORDER.fetch_add(1, Ordering::Relaxed);
    format!("____{session_id}_{n}____")
}
