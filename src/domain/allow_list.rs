use std::collections::HashSet;

use super::types::InstalledApp;

/// Application names excluded from reported inventories (system and
/// management apps). Matching is exact and case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    names: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, display_name: &str) -> bool {
        self.names.contains(display_name)
    }

    pub fn filter(&self, apps: Vec<InstalledApp>) -> Vec<InstalledApp> {
        apps.into_iter()
            .filter(|app| !self.contains(&app.display_name))
            .collect()
    }
}
