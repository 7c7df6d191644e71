//! Timestamp helpers.

use std::time::SystemTime;

/// The current time, used wherever a span or event timestamp is defaulted.
pub(crate) fn now() -> SystemTime {
    SystemTime::now()
}
