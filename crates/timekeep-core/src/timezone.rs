//! Timezone identifier resolution.
//!
//! Supports 'local', 'UTC', and IANA timezone names.

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{Error, Result};

/// A resolved timezone: canonical identifier plus the zone itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTimeZone {
    /// Canonical zone identifier (e.g. "America/New_York", "UTC").
    pub id: String,
    /// The resolved zone.
    pub tz: Tz,
}

impl ResolvedTimeZone {
    /// Current UTC offset of this zone.
    pub fn utc_offset(&self) -> FixedOffset {
        self.tz
            .offset_from_utc_datetime(&Utc::now().naive_utc())
            .fix()
    }

    /// Current UTC offset rendered as ±HH:MM.
    pub fn offset_string(&self) -> String {
        let secs = self.utc_offset().local_minus_utc();
        let sign = if secs < 0 { '-' } else { '+' };
        let abs = secs.abs();
        format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
    }

    /// Current time in this zone.
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}

/// Resolves timezone identifiers to zones.
///
/// Modeled as a trait so the registry can take the resolver as an
/// explicit collaborator and tests can substitute their own.
pub trait TimeZoneResolver: Send + Sync {
    /// Resolve a timezone identifier: 'local', 'UTC', or an IANA name
    /// (e.g. 'America/New_York'). Empty or whitespace defaults to 'local'.
    fn resolve(&self, timezone_id: &str) -> Result<ResolvedTimeZone>;
}

/// Resolver backed by the system zone database (chrono-tz).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeZoneResolver;

impl SystemTimeZoneResolver {
    pub fn new() -> Self {
        Self
    }

    fn resolve_local(&self) -> Result<ResolvedTimeZone> {
        let name = iana_time_zone::get_timezone().map_err(|e| Error::TimezoneResolutionError {
            timezone: "local".to_string(),
            message: e.to_string(),
        })?;
        let tz: Tz = name.parse().map_err(|_| Error::TimezoneResolutionError {
            timezone: "local".to_string(),
            message: format!("system zone '{name}' is not a known IANA zone"),
        })?;
        Ok(ResolvedTimeZone {
            id: tz.name().to_string(),
            tz,
        })
    }
}

impl TimeZoneResolver for SystemTimeZoneResolver {
    fn resolve(&self, timezone_id: &str) -> Result<ResolvedTimeZone> {
        let timezone_id = timezone_id.trim();
        if timezone_id.is_empty() || timezone_id.eq_ignore_ascii_case("local") {
            return self.resolve_local();
        }

        if timezone_id.eq_ignore_ascii_case("utc") {
            return Ok(ResolvedTimeZone {
                id: "UTC".to_string(),
                tz: Tz::UTC,
            });
        }

        // Exact IANA lookup first, then a case-insensitive scan
        if let Ok(tz) = timezone_id.parse::<Tz>() {
            return Ok(ResolvedTimeZone {
                id: tz.name().to_string(),
                tz,
            });
        }
        if let Some(tz) = chrono_tz::TZ_VARIANTS
            .iter()
            .find(|tz| tz.name().eq_ignore_ascii_case(timezone_id))
        {
            return Ok(ResolvedTimeZone {
                id: tz.name().to_string(),
                tz: *tz,
            });
        }

        Err(Error::UnknownTimezone(timezone_id.to_string()))
    }
}
