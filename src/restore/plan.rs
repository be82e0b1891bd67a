// snapshottool/src/restore/plan.rs
use std::collections::BTreeSet;

use crate::utils::tables::TableRegistry;

/// Order in which the tables of a document are restored.
///
/// Known tables come first in registry (dependency) order, then tables the registry does
/// not know about in lexical order. Skipped tables never appear.
pub fn build_restore_plan<'a, I>(registry: &TableRegistry, present_tables: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: BTreeSet<&str> = present_tables.into_iter().collect();

    let mut plan: Vec<String> = Vec::with_capacity(present.len());
    for table in registry.known_tables() {
        if present.contains(table.as_str()) && !registry.is_skipped(table) && !plan.contains(table) {
            plan.push(table.clone());
        }
    }

    // BTreeSet iteration is already lexical.
    let trailing: Vec<String> = present
        .into_iter()
        .filter(|t| !registry.is_known(t) && !registry.is_skipped(t))
        .map(str::to_string)
        .collect();

    plan.extend(trailing);
    plan
}
