//! Pass/fail verdicts for `(country, ip)` queries.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use crate::index::AddressSet;
use crate::store::ZoneStore;

/// Reason behind a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Address is inside the country's zone
    Authorized,
    /// Country has no installed zone
    UnknownCountry,
    /// Query address could not be parsed
    InvalidAddress,
    /// Address is outside the country's zone
    OutsideCountry,
    /// Address is inside the zone but on the anonymizer exit list
    AnonymizerExit,
}

impl Reason {
    /// Get the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Authorized => "authorized",
            Reason::UnknownCountry => "unknown-country",
            Reason::InvalidAddress => "invalid-address",
            Reason::OutsideCountry => "outside-country",
            Reason::AnonymizerExit => "anonymizer-exit",
        }
    }

    /// Check if this reason allows the request.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Reason::Authorized)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verdict for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub country: String,
    pub reason: Reason,
}

impl Verdict {
    /// Check if the request is allowed.
    pub fn allowed(&self) -> bool {
        self.reason.is_allowed()
    }

    /// Human-readable text returned to the caller.
    pub fn text(&self) -> String {
        if self.allowed() {
            format!("Authorized for country {}", self.country)
        } else {
            format!("UnAuthorized for country {}", self.country)
        }
    }
}

/// DecisionEngine is the sole authority for pass/fail verdicts.
///
/// It only reads whatever the [`ZoneStore`] currently has installed and
/// never performs I/O, so it is safe to call from any number of request
/// handlers concurrently.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use zoneauth::decision::DecisionEngine;
/// use zoneauth::index::RangeIndex;
/// use zoneauth::store::ZoneStore;
///
/// let store = Arc::new(ZoneStore::new());
/// store.install("us", RangeIndex::build(["203.0.113.0/24"]));
///
/// let engine = DecisionEngine::new(store, false);
/// assert!(engine.decide("us", "203.0.113.5"));
/// assert!(!engine.decide("us", "8.8.8.8"));
/// assert!(!engine.decide("de", "203.0.113.5"));
/// ```
pub struct DecisionEngine {
    store: Arc<ZoneStore>,
    block_anonymizers: bool,
}

impl DecisionEngine {
    /// Create an engine over `store`.
    pub fn new(store: Arc<ZoneStore>, block_anonymizers: bool) -> Self {
        Self {
            store,
            block_anonymizers,
        }
    }

    /// Check if anonymizer exclusion is enforced.
    pub fn blocks_anonymizers(&self) -> bool {
        self.block_anonymizers
    }

    /// Get the underlying store.
    pub fn store(&self) -> &Arc<ZoneStore> {
        &self.store
    }

    /// Decide whether `ip` may pass for `country`.
    pub fn decide(&self, country: &str, ip: &str) -> bool {
        self.evaluate(country, ip).allowed()
    }

    /// Decide and explain.
    pub fn evaluate(&self, country: &str, ip: &str) -> Verdict {
        let country = ZoneStore::normalize(country);
        let reason = self.reason(&country, ip);

        match reason {
            Reason::UnknownCountry => log::warn!(
                "Country {:?} is not in the local zone cache, denying {:?}",
                country,
                ip
            ),
            _ => log::debug!("{}", query_record(&country, ip, reason)),
        }

        Verdict { country, reason }
    }

    fn reason(&self, country: &str, ip: &str) -> Reason {
        let Some(index) = self.store.get(country) else {
            return Reason::UnknownCountry;
        };
        let Ok(addr) = ip.trim().parse::<IpAddr>() else {
            return Reason::InvalidAddress;
        };
        if !index.contains(addr) {
            return Reason::OutsideCountry;
        }
        if self.block_anonymizers {
            if let Some(exclusions) = self.store.exclusions() {
                if exclusions.contains(addr) {
                    return Reason::AnonymizerExit;
                }
            }
        }
        Reason::Authorized
    }
}

/// One-line log record for a query. Both inputs come from the request path,
/// so they are quoted and escaped.
fn query_record(country: &str, ip: &str, reason: Reason) -> String {
    format!(
        "country={:?} ip={:?} allowed={} reason={}",
        country,
        ip,
        reason.is_allowed(),
        reason
    )
}
