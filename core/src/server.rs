//! References to the servers of a walb deployment.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Storage,
    Proxy,
    Archive,
}

/// Connection parameters of one server. The scheduler only ever queries
/// archives; storage and proxy refs exist in the layout but are inert.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerRef {
    pub name: String,
    pub addr: String,
    pub port: u16,
    pub kind: ServerKind,
}

impl ServerRef {
    pub fn archive(name: &str, addr: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            addr: addr.to_string(),
            port,
            kind: ServerKind::Archive,
        }
    }

    pub fn is_archive(&self) -> bool {
        self.kind == ServerKind::Archive
    }
}

impl fmt::Display for ServerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The full server layout the worker operates in.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerLayout {
    pub storages: Vec<ServerRef>,
    pub proxies: Vec<ServerRef>,
    pub archives: Vec<ServerRef>,
}

impl ServerLayout {
    /// A minimal layout around one archive, with placeholder storage and
    /// proxy entries.
    pub fn around_archive(a0: ServerRef) -> Self {
        Self {
            storages: vec![ServerRef {
                name: "s0".to_string(),
                addr: String::new(),
                port: 0,
                kind: ServerKind::Storage,
            }],
            proxies: vec![ServerRef {
                name: "p0".to_string(),
                addr: String::new(),
                port: 0,
                kind: ServerKind::Proxy,
            }],
            archives: vec![a0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_around_archive() {
        let a0 = ServerRef::archive("a0", "192.0.2.1", 10000);
        let layout = ServerLayout::around_archive(a0.clone());
        assert_eq!(layout.archives, vec![a0]);
        assert_eq!(layout.storages.len(), 1);
        assert_eq!(layout.proxies.len(), 1);
        assert!(!layout.storages[0].is_archive());
    }
}
