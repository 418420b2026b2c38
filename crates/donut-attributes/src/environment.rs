//! Layered variable environment used to resolve attribute placeholders.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::ManifestError;
use crate::manifest::read_manifest_properties;

/// `${NAME}` (any name up to the closing brace) or `$NAME`.
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([^}]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("placeholder pattern is valid")
    })
}

/// Variables available for placeholder substitution.
///
/// Built fresh for every report run: the build environment first, then
/// properties declared in the build manifest for keys the build environment
/// does not already define.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an environment from name/value pairs. Later pairs overwrite
    /// earlier ones with the same name.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Snapshot of the current process environment.
    pub fn from_process_env() -> Self {
        Self::from_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(name.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Add the given variables for names not yet defined.
    ///
    /// Within `vars` a later pair overwrites an earlier one, but nothing
    /// overwrites a name this environment already had. Returns how many
    /// names were added.
    pub fn merge_absent<I, K, V>(&mut self, vars: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let incoming: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut added = 0;
        for (name, value) in incoming {
            if !self.vars.contains_key(&name) {
                self.vars.insert(name, value);
                added += 1;
            }
        }
        added
    }

    /// Merge the `<properties>` of the manifest at `path`.
    ///
    /// A missing or unreadable manifest leaves the environment unchanged;
    /// a manifest that exists but does not parse is an error.
    pub fn with_manifest(mut self, path: &Path) -> Result<Self, ManifestError> {
        if let Some(properties) = read_manifest_properties(path)? {
            let declared = properties.len();
            let added = self.merge_absent(properties);
            debug!(manifest = %path.display(), declared, added, "Merged manifest properties");
        }
        Ok(self)
    }

    /// Substitute `${NAME}` and `$NAME` references.
    ///
    /// References to undefined names become empty strings. A `$` that does
    /// not start a reference, including an unterminated `${`, is kept.
    pub fn expand(&self, raw: &str) -> String {
        placeholder_pattern()
            .replace_all(raw, |caps: &Captures<'_>| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                self.get(name).unwrap_or_default().to_string()
            })
            .into_owned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_vars(iter)
    }
}
