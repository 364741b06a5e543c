//! # Validation
//!
//! Checks applied before a mutation is accepted into the offline queue.
//! A queued action is replayed verbatim much later, so malformed input has
//! to be rejected while the user is still looking at the form.

use crate::error::{CoreError, CoreResult};
use crate::types::NewOfflineAction;

/// Validates an API endpoint.
///
/// Endpoints are joined onto the configured API base URL at replay time, with
/// or without a leading `/`. Only endpoints that would name another host are
/// rejected:
/// - empty or blank
/// - scheme-relative (`//host/...`)
/// - scheme-prefixed (`https:...`, a `:` before the first `/`, `?` or `#`)
///
/// Query strings and fragments are not inspected, so `/go?to=https://x` is fine.
pub fn validate_endpoint(endpoint: &str) -> CoreResult<()> {
    let invalid = |reason: &str| CoreError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    if endpoint.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if endpoint.starts_with("//") {
        return Err(invalid("must be a path, not a URL"));
    }

    let head_end = endpoint.find(['/', '?', '#']).unwrap_or(endpoint.len());
    if endpoint[..head_end].contains(':') {
        return Err(invalid("must be a path, not a URL"));
    }
    Ok(())
}

/// Validates an action before it is queued.
pub fn validate_action(action: &NewOfflineAction) -> CoreResult<()> {
    validate_endpoint(&action.endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionType;
    use serde_json::json;

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("/inquiries").is_ok());
        assert!(validate_endpoint("/saved-properties/p-42").is_ok());
        assert!(validate_endpoint("inquiries").is_ok());
        assert!(validate_endpoint("saved/p-3").is_ok());
        assert!(validate_endpoint("/searches?next=https://x").is_ok());
        assert!(validate_endpoint("/redirect#https://x").is_ok());
        assert!(validate_endpoint("/times/12:30").is_ok());

        assert!(validate_endpoint("").is_err());
        assert!(validate_endpoint("   ").is_err());
        assert!(validate_endpoint("//evil.example/x").is_err());
        assert!(validate_endpoint("https://evil.example/steal").is_err());
        assert!(validate_endpoint("mailto:someone").is_err());
    }

    #[test]
    fn test_validate_action() {
        let ok = NewOfflineAction::new(ActionType::SaveSearch, "/saved-searches", json!({}));
        assert!(validate_action(&ok).is_ok());

        let bad = NewOfflineAction::new(ActionType::SaveSearch, "https://x/saved", json!({}));
        assert!(matches!(
            validate_action(&bad),
            Err(CoreError::InvalidEndpoint { .. })
        ));
    }
}
