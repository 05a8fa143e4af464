//! Per-cycle identity context and the first-request correction rules.

use rfc_sync_protocol::{is_unknown, is_valid_identity, UNKNOWN};
use tracing::{debug, warn};

/// Outcome of reconciling one identity field with the server's view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityCorrection {
    /// The server supplied a concrete value; the working value now uses it.
    Adopted(String),
    /// The server answered `Unknown` but a valid prior value exists and was kept.
    RetainedPrior,
    /// The candidate contains characters other than ASCII letters and digits.
    Rejected,
    /// Nothing to do.
    NoChange,
}

impl IdentityCorrection {
    /// Returns true if the request should be repeated with corrected identity.
    pub fn wants_retry(&self) -> bool {
        matches!(
            self,
            IdentityCorrection::Adopted(_) | IdentityCorrection::RetainedPrior
        )
    }
}

/// Identity values carried through one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncContext {
    /// Working account id sent in the query.
    pub account_id: String,
    /// Working partner id sent in the query.
    pub partner_id: String,
    /// Experience sent in the query.
    pub experience: String,
    /// OS class sent in the query.
    pub os_class: String,
    /// Last account id validated against the server.
    pub valid_account_id: String,
    /// Last partner id validated against the server.
    pub valid_partner_id: String,
}

impl Default for SyncContext {
    fn default() -> Self {
        Self {
            account_id: UNKNOWN.to_string(),
            partner_id: UNKNOWN.to_string(),
            experience: String::new(),
            os_class: String::new(),
            valid_account_id: UNKNOWN.to_string(),
            valid_partner_id: UNKNOWN.to_string(),
        }
    }
}

impl SyncContext {
    /// Creates a context with every identity `Unknown`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Corrects the working account id from the manifest's value.
    pub fn correct_account(&mut self, candidate: Option<&str>) -> IdentityCorrection {
        let correction = correct(
            candidate,
            &mut self.account_id,
            &mut self.valid_account_id,
        );
        debug!(field = "accountId", ?correction, "identity correction");
        correction
    }

    /// Corrects the working partner id from the manifest's value.
    pub fn correct_partner(&mut self, candidate: Option<&str>) -> IdentityCorrection {
        let correction = correct(
            candidate,
            &mut self.partner_id,
            &mut self.valid_partner_id,
        );
        debug!(field = "partnerId", ?correction, "identity correction");
        correction
    }

    /// Returns true if either identity is still unknown.
    pub fn has_unknown_identity(&self) -> bool {
        is_unknown(&self.account_id) || is_unknown(&self.partner_id)
    }
}

fn correct(candidate: Option<&str>, working: &mut String, valid: &mut String) -> IdentityCorrection {
    let candidate = candidate
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNKNOWN);

    if !is_valid_identity(candidate) {
        warn!(candidate, "identity value contains invalid characters, ignoring");
        return IdentityCorrection::Rejected;
    }

    let prior = working.clone();
    *valid = candidate.to_string();

    if !is_unknown(candidate) {
        *working = candidate.to_string();
        return IdentityCorrection::Adopted(candidate.to_string());
    }

    if !prior.is_empty() && !is_unknown(&prior) && is_valid_identity(&prior) {
        *valid = prior;
        return IdentityCorrection::RetainedPrior;
    }

    IdentityCorrection::NoChange
}
