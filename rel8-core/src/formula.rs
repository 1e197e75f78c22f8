//! Scoring-formula configuration.
//!
//! The connection-strength score shown in the CRM is a weighted sum whose
//! weights are tunable per deployment. This module resolves a
//! `(category, key)` pair to a numeric value: stored overrides win, then the
//! hard-coded defaults, so a missing or partial settings table never breaks
//! scoring.

use std::collections::BTreeMap;

/// Hard-coded fallback weights, keyed by (category, key).
const DEFAULTS: &[(&str, &str, f64)] = &[
    ("connection_strength", "interaction_weight", 2.0),
    ("connection_strength", "recency_weight", 1.5),
    ("connection_strength", "frequency_weight", 1.0),
    ("connection_strength", "affinity_weight", 3.0),
    ("connection_strength", "base_score", 10.0),
    ("recency", "half_life_days", 30.0),
    ("recency", "max_age_days", 365.0),
    ("outreach", "completed_bonus", 5.0),
    ("outreach", "overdue_penalty", 2.0),
];

/// Resolved formula configuration: defaults plus any stored overrides.
#[derive(Debug, Clone, Default)]
pub struct FormulaConfig {
    overrides: BTreeMap<(String, String), f64>,
}

impl FormulaConfig {
    /// Build a config from stored override rows.
    ///
    /// Rows for unknown (category, key) pairs are kept too; callers that ask
    /// for them get the stored value, everyone else falls through to the
    /// defaults.
    pub fn with_overrides<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, String, f64)>,
    {
        let overrides = rows
            .into_iter()
            .map(|(category, key, value)| ((category, key), value))
            .collect();
        FormulaConfig { overrides }
    }

    /// Look up a value; `None` when neither an override nor a default exists.
    pub fn resolve(&self, category: &str, key: &str) -> Option<f64> {
        if let Some(value) = self
            .overrides
            .get(&(category.to_string(), key.to_string()))
        {
            return Some(*value);
        }
        DEFAULTS
            .iter()
            .find(|(c, k, _)| *c == category && *k == key)
            .map(|(_, _, v)| *v)
    }

    /// Full resolved view (defaults merged with overrides), grouped by
    /// category. Used by the settings API.
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        let mut out: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for (category, key, value) in DEFAULTS {
            out.entry(category.to_string())
                .or_default()
                .insert(key.to_string(), *value);
        }
        for ((category, key), value) in &self.overrides {
            out.entry(category.clone())
                .or_default()
                .insert(key.clone(), *value);
        }
        out
    }
}
