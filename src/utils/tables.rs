// Table configuration constants

/// Application tables in dependency order: every table appears after the tables it references.
pub const KNOWN_TABLES: &[&str] = &[
    "site_settings",
    "categories",
    "neighborhoods",
    "profiles",
    "organizations",
    "organization_members",
    "requests",
    "request_assignments",
    "request_updates",
    "comments",
    "attachments",
    "notifications",
    "moderation_reports",
    "backup_logs",
];

/// Operational and audit tables that a restore must never overwrite.
pub const SKIP_ON_RESTORE: &[&str] = &["backup_logs", "audit_events", "schema_migrations"];

/// Known tables and restore exclusions.
///
/// Entries that no longer exist in the store are harmless: planning only ever looks at
/// tables that are actually present in a backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRegistry {
    known: Vec<String>,
    skip: Vec<String>,
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new(
            KNOWN_TABLES.iter().map(|t| t.to_string()).collect(),
            SKIP_ON_RESTORE.iter().map(|t| t.to_string()).collect(),
        )
    }
}

impl TableRegistry {
    pub fn new(known: Vec<String>, skip: Vec<String>) -> Self {
        Self { known, skip }
    }

    pub fn known_tables(&self) -> &[String] {
        &self.known
    }

    pub fn skip_on_restore(&self) -> &[String] {
        &self.skip
    }

    pub fn is_known(&self, table: &str) -> bool {
        self.known.iter().any(|t| t == table)
    }

    pub fn is_skipped(&self, table: &str) -> bool {
        self.skip.iter().any(|t| t == table)
    }

    /// Adds `table` to the restore exclusions if it is not already there.
    pub fn with_skipped(mut self, table: &str) -> Self {
        if !self.is_skipped(table) {
            self.skip.push(table.to_string());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_orders_parents_first() {
        let registry = TableRegistry::default();
        let position = |name: &str| registry.known_tables().iter().position(|t| t == name).unwrap();
        assert!(position("categories") < position("requests"));
        assert!(position("profiles") < position("requests"));
        assert!(position("requests") < position("request_assignments"));
        assert!(position("requests") < position("comments"));
    }

    #[test]
    fn test_run_log_table_is_skipped_on_restore() {
        let registry = TableRegistry::default();
        assert!(registry.is_known("backup_logs"));
        assert!(registry.is_skipped("backup_logs"));
        assert!(!registry.is_skipped("requests"));
    }

    #[test]
    fn test_with_skipped_adds_once() {
        let registry = TableRegistry::default()
            .with_skipped("run_history")
            .with_skipped("backup_logs");
        assert!(registry.is_skipped("run_history"));
        assert_eq!(
            registry.skip_on_restore().iter().filter(|t| *t == "backup_logs").count(),
            1
        );
    }
}
