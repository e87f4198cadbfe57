//! Claims presenter: flattens a session's claim set into a display mapping.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::{AuthError, Session};

/// Read-only mapping from claim type to claim value.
///
/// Keeps the order in which each claim type first appeared. When a type
/// repeats, the later value replaces the earlier one in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimsView {
    entries: Vec<(String, String)>,
}

impl ClaimsView {
    fn insert(&mut self, claim_type: &str, value: &str) {
        match self.entries.iter_mut().find(|(t, _)| t == claim_type) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self
                .entries
                .push((claim_type.to_string(), value.to_string())),
        }
    }

    /// Value for a claim type.
    pub fn get(&self, claim_type: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == claim_type)
            .map(|(_, v)| v.as_str())
    }

    /// Number of distinct claim types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the view holds no claims.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(type, value)` pairs in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }

}

impl Serialize for ClaimsView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (t, v) in &self.entries {
            map.serialize_entry(t, v)?;
        }
        map.end()
    }
}

/// Build the claims view for an authenticated request.
///
/// Must only be called once the gate has allowed the request with a
/// session. A missing session means the gating is broken, so this fails
/// with [`AuthError::Precondition`] instead of returning an empty view.
///
/// Repeated claim types collapse to the last value (the provider does
/// not guarantee unique types; callers needing every value should read
/// [`Session::claims`] directly).
pub fn present(session: Option<&Session>) -> Result<ClaimsView, AuthError> {
    let session = session.ok_or_else(|| {
        AuthError::Precondition("claims requested for a request without a session".to_string())
    })?;

    let mut view = ClaimsView::default();
    for claim in session.claims() {
        view.insert(&claim.claim_type, &claim.value);
    }
    Ok(view)
}
