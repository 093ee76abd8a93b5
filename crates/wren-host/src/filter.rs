//! Request-filter hook, the interface consumed from the ad-block engine.

/// Consulted before a surface load is handed to the engine. A blocked load
/// fails with `HostError::Blocked`, which callers log and absorb.
pub trait RequestFilter: Send + Sync {
    fn should_block(&self, url: &str) -> bool;
}

/// The default filter: blocks nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl RequestFilter for AllowAll {
    fn should_block(&self, _url: &str) -> bool {
        false
    }
}

/// A host-suffix blocklist. Stands in for the external filter engine in
/// tests and headless embedding.
#[derive(Debug, Default)]
pub struct DomainBlocklist {
    domains: Vec<String>,
}

impl DomainBlocklist {
    pub fn new(domains: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            domains: domains.into_iter().map(Into::into).collect(),
        }
    }
}

impl RequestFilter for DomainBlocklist {
    fn should_block(&self, url: &str) -> bool {
        let host = url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(url)
            .split(['/', '?', '#'])
            .next()
            .unwrap_or("");

        self.domains
            .iter()
            .any(|d| host == d || host.ends_with(&format!(".{d}")))
    }
}
