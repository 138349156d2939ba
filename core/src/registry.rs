use std::collections::HashMap;
use std::sync::Arc;

use common::err::{CResult, ReError};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::session::Session;
use crate::uri::Uri;

/// Produces a `Session` for one URI scheme. Driver crates implement this
/// and register an instance under their scheme(s) (`sqlite`, `file`,
/// `mysql`, `postgres`).
pub trait DriverFactory: Send + Sync {
    fn open(&self, uri: &Uri) -> CResult<Box<dyn Session>>;
}

static REGISTRY: Lazy<RwLock<HashMap<String, Arc<dyn DriverFactory>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers `factory` under `scheme`. Idempotent: registering the same
/// scheme twice replaces the prior factory, matching spec.md §4.2.
pub fn register(scheme: &str, factory: Arc<dyn DriverFactory>) {
    debug!("registering driver factory for scheme: {}", scheme);
    let mut registry = REGISTRY.write();
    registry.insert(scheme.to_string(), factory);
}

/// Parses `uri`, dispatches to the registered factory for its scheme, and
/// returns an opened Session. `UnknownScheme` if no factory is registered;
/// `ConnectionRefused` wraps whatever the factory itself reports.
pub fn create_session(uri: &str) -> CResult<Box<dyn Session>> {
    let parsed = Uri::parse(uri)?;

    let factory = {
        let registry = REGISTRY.read();
        registry.get(&parsed.scheme).cloned()
    };

    match factory {
        Some(factory) => factory.open(&parsed),
        None => {
            error!("no driver factory registered for scheme: {}", parsed.scheme);
            Err(ReError::UnknownScheme(parsed.scheme))
        }
    }
}

/// True if `scheme` currently has a registered factory.
pub fn is_registered(scheme: &str) -> bool {
    REGISTRY.read().contains_key(scheme)
}

#[cfg(test)]
mod test {
    use super::*;

    struct FailingFactory;

    impl DriverFactory for FailingFactory {
        fn open(&self, _uri: &Uri) -> CResult<Box<dyn Session>> {
            Err(ReError::ConnectionRefused("test factory always fails".into()))
        }
    }

    #[test]
    fn unregistered_scheme_is_unknown_scheme() {
        let err = create_session("nosuchdriver://host/db").unwrap_err();
        assert!(matches!(err, ReError::UnknownScheme(_)));
    }

    #[test]
    fn registering_replaces_prior_factory() {
        register("testscheme", Arc::new(FailingFactory));
        assert!(is_registered("testscheme"));
        let err = create_session("testscheme://host/db").unwrap_err();
        assert!(matches!(err, ReError::ConnectionRefused(_)));

        register("testscheme", Arc::new(FailingFactory));
        assert!(is_registered("testscheme"));
    }
}
