//! Session retention policy.
//!
//! Sessions are held in memory only, so retention is what bounds the
//! registry: a session is evicted once it is too old outright, or once an
//! active session has gone quiet for too long. Ended sessions stay
//! queryable until the age limit removes them.

use chrono::{DateTime, TimeDelta, Utc};

use crate::model::Session;

/// Sessions older than this are evicted regardless of state.
pub const MAX_SESSION_AGE: TimeDelta = TimeDelta::hours(24);

/// Active sessions with no activity for this long are evicted.
pub const MAX_INACTIVITY: TimeDelta = TimeDelta::hours(4);

/// Whether a session should be evicted as of `now`.
///
/// Pure policy check; the registry sweep applies it over a stable
/// snapshot of entries.
pub fn is_expired(session: &Session, now: DateTime<Utc>) -> bool {
    if now - session.start_time > MAX_SESSION_AGE {
        return true;
    }
    !session.is_ended() && now - session.last_activity_time > MAX_INACTIVITY
}
