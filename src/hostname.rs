//! Best-effort hostname resolution

use sysinfo::System;
use tracing::debug;

pub trait HostnameResolver: Send + Sync {
    /// Hostname of this host, empty if it cannot be determined
    fn hostname(&self) -> String;
}

/// Resolves the hostname from the operating system, unless overridden
#[derive(Debug, Clone, Default)]
pub struct SystemHostname {
    configured: Option<String>,
}

impl SystemHostname {
    pub fn new(configured: Option<String>) -> Self {
        Self { configured }
    }
}

impl HostnameResolver for SystemHostname {
    fn hostname(&self) -> String {
        if let Some(hostname) = &self.configured {
            return hostname.clone();
        }

        System::host_name().unwrap_or_else(|| {
            debug!("unable to determine hostname");
            String::new()
        })
    }
}
