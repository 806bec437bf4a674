//! Store connection configuration
//!
//! Resolution order used by [`StoreConfig::from_env`]:
//! 1. `SURREALDB_ENDPOINT` + credentials (remote server / cloud)
//! 2. `SURREALDB_URL` (any engine URL, no auth)
//! 3. local `surrealkv` files under `.campaign/db`

/// Where and how to reach SurrealDB.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreTarget {
    /// Authenticated remote endpoint (e.g. `wss://...`)
    Remote {
        endpoint: String,
        username: String,
        password: String,
        /// Root user (true) or database user (false)
        is_root: bool,
    },
    /// Unauthenticated engine URL (`mem://`, `surrealkv://path`, `ws://...`)
    Url(String),
}

/// Configuration for a SurrealDB-backed campaign store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub target: StoreTarget,
    /// Namespace (default: "campaign")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
}

impl StoreConfig {
    /// In-memory engine (tests, dry runs)
    pub fn in_memory() -> Self {
        Self::url("mem://")
    }

    /// Unauthenticated engine URL
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            target: StoreTarget::Url(url.into()),
            namespace: "campaign".to_string(),
            database: "main".to_string(),
        }
    }

    /// Authenticated database user on a remote endpoint
    pub fn remote(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            target: StoreTarget::Remote {
                endpoint: endpoint.into(),
                username: username.into(),
                password: password.into(),
                is_root: false,
            },
            namespace: "campaign".to_string(),
            database: "main".to_string(),
        }
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Mark remote credentials as a root user
    pub fn with_root(mut self, root: bool) -> Self {
        if let StoreTarget::Remote { is_root, .. } = &mut self.target {
            *is_root = root;
        }
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT, SURREALDB_USERNAME, SURREALDB_PASSWORD (remote)
    /// - SURREALDB_ROOT (optional, "true" for root users)
    /// - SURREALDB_URL (fallback engine URL)
    /// - SURREALDB_NAMESPACE (optional, default: "campaign")
    /// - SURREALDB_DATABASE (optional, default: "main")
    pub fn from_env() -> Self {
        let endpoint = std::env::var("SURREALDB_ENDPOINT").ok();
        let username = std::env::var("SURREALDB_USERNAME").ok();
        let password = std::env::var("SURREALDB_PASSWORD").ok();

        let base = match (endpoint, username, password) {
            (Some(endpoint), Some(username), Some(password)) => {
                let is_root = std::env::var("SURREALDB_ROOT")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false);
                Self::remote(endpoint, username, password).with_root(is_root)
            }
            _ => match std::env::var("SURREALDB_URL") {
                Ok(url) => Self::url(url),
                Err(_) => Self::url(format!("surrealkv://{}", DEFAULT_LOCAL_PATH)),
            },
        };

        let namespace =
            std::env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| "campaign".to_string());
        let database = std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| "main".to_string());
        base.with_namespace(namespace).with_database(database)
    }

    /// Directory to create before connecting, for file-backed engines.
    pub fn local_path(&self) -> Option<&str> {
        match &self.target {
            StoreTarget::Url(url) => url.strip_prefix("surrealkv://"),
            StoreTarget::Remote { .. } => None,
        }
    }
}

/// Local persistence directory used when nothing else is configured
pub const DEFAULT_LOCAL_PATH: &str = ".campaign/db";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_namespace_and_database() {
        let cfg = StoreConfig::in_memory()
            .with_namespace("ville")
            .with_database("liste2026");
        assert_eq!(cfg.namespace, "ville");
        assert_eq!(cfg.database, "liste2026");
        assert_eq!(cfg.target, StoreTarget::Url("mem://".into()));
    }

    #[test]
    fn root_flag_only_applies_to_remote() {
        let cfg = StoreConfig::remote("wss://db.example", "u", "p").with_root(true);
        assert!(matches!(cfg.target, StoreTarget::Remote { is_root: true, .. }));

        let cfg = StoreConfig::in_memory().with_root(true);
        assert_eq!(cfg.target, StoreTarget::Url("mem://".into()));
    }

    #[test]
    fn local_path_for_surrealkv() {
        let cfg = StoreConfig::url("surrealkv://.campaign/db");
        assert_eq!(cfg.local_path(), Some(".campaign/db"));
        assert_eq!(StoreConfig::in_memory().local_path(), None);
    }
}
