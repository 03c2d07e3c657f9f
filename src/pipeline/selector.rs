use std::collections::HashMap;

use axum::http::Method;

/// Which checks apply to one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSet {
    pub auth: bool,
    pub rate_limit: bool,
}

impl CheckSet {
    pub const ALL: CheckSet = CheckSet {
        auth: true,
        rate_limit: true,
    };
    pub const RATE_LIMIT_ONLY: CheckSet = CheckSet {
        auth: false,
        rate_limit: true,
    };
    pub const NONE: CheckSet = CheckSet {
        auth: false,
        rate_limit: false,
    };
}

/// Routing table from method to required checks, built once at startup
/// and immutable afterwards. Methods not listed get every check.
#[derive(Debug, Clone)]
pub struct Selector {
    rules: HashMap<String, CheckSet>,
}

impl Selector {
    /// The service defaults: health is unchecked, and the login surface
    /// (verification and issuance happen before a caller holds a usable
    /// credential) is throttled but not authenticated.
    pub fn service_defaults() -> Self {
        let mut rules = HashMap::new();
        rules.insert("GET /v1/healthz".to_string(), CheckSet::NONE);
        rules.insert(
            "POST /v1/tokens/authenticate".to_string(),
            CheckSet::RATE_LIMIT_ONLY,
        );
        rules.insert("POST /v1/tokens".to_string(), CheckSet::RATE_LIMIT_ONLY);
        rules.insert("DELETE /v1/tokens".to_string(), CheckSet::ALL);
        Self { rules }
    }

    pub fn checks_for(&self, method: &Method, path: &str) -> CheckSet {
        self.rules
            .get(&format!("{method} {path}"))
            .copied()
            .unwrap_or(CheckSet::ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_is_exempt_from_every_check() {
        let selector = Selector::service_defaults();
        assert_eq!(
            selector.checks_for(&Method::GET, "/v1/healthz"),
            CheckSet::NONE
        );
    }

    #[test]
    fn login_surface_is_throttled_but_not_authenticated() {
        let selector = Selector::service_defaults();
        for path in ["/v1/tokens/authenticate", "/v1/tokens"] {
            let checks = selector.checks_for(&Method::POST, path);
            assert!(checks.rate_limit);
            assert!(!checks.auth);
        }
    }

    #[test]
    fn revocation_requires_an_authenticated_caller() {
        let selector = Selector::service_defaults();
        assert_eq!(
            selector.checks_for(&Method::DELETE, "/v1/tokens"),
            CheckSet::ALL
        );
    }

    #[test]
    fn unknown_methods_get_every_check() {
        let selector = Selector::service_defaults();
        assert_eq!(
            selector.checks_for(&Method::GET, "/v1/does-not-exist"),
            CheckSet::ALL
        );
    }
}
