use std::collections::HashMap;

use crate::config::{ConfigSnapshot, Settings};
use crate::util::local_hostname;

/// Decides which host a metric is reported under.
///
/// Later steps win: local hostname, then the global override, then an
/// override scoped to the producing source's section.
#[derive(Debug, Clone, PartialEq)]
pub struct HostResolver {
    local: String,
    global: Option<String>,
    per_source: HashMap<String, String>,
}

impl HostResolver {
    pub fn new(local: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            global: None,
            per_source: HashMap::new(),
        }
    }

    pub fn with_global(mut self, global: Option<String>) -> Self {
        self.global = global;
        self
    }

    pub fn with_source_override(mut self, source: impl Into<String>, host: impl Into<String>) -> Self {
        self.per_source.insert(source.into(), host.into());
        self
    }

    /// Build the resolver once at startup for the given source sections
    pub fn from_config<'a>(
        snapshot: &ConfigSnapshot,
        settings: &Settings,
        sources: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut resolver = HostResolver::new(local_hostname()).with_global(settings.hostname.clone());

        for source in sources {
            if let Some(host) = snapshot
                .get(source, "hostname")
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
            {
                resolver.per_source.insert(source.to_string(), host);
            }
        }

        resolver
    }

    /// Host for metrics produced by `collector`
    pub fn resolve(&self, collector: &str) -> &str {
        if let Some(host) = self.per_source.get(collector) {
            return host;
        }
        self.global.as_deref().unwrap_or(&self.local)
    }
}
