//! Static redirect table

use std::collections::HashMap;

use crate::config::RedirectSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRule {
    pub target: String,
    pub code: u16,
}

/// Exact path -> redirect rule, built once at startup
#[derive(Debug, Clone, Default)]
pub struct RedirectTable {
    rules: HashMap<String, RedirectRule>,
}

impl RedirectTable {
    pub fn from_config(redirects: &HashMap<String, RedirectSpec>) -> Self {
        let rules = redirects
            .iter()
            .map(|(path, spec)| {
                (
                    path.clone(),
                    RedirectRule {
                        target: spec.target().to_string(),
                        code: spec.code(),
                    },
                )
            })
            .collect();
        Self { rules }
    }

    /// Exact string match only; no prefix or trailing-slash folding
    pub fn lookup(&self, path: &str) -> Option<&RedirectRule> {
        self.rules.get(path)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
