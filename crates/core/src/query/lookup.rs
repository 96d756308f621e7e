//! Fuzzy lookup of dotted parameter paths
//!
//! Paths look like `schema.table.column`. A key matches every path whose trailing segments
//! equal the key's segments after shortcut expansion, so `cube.ra` finds
//! `mangadatadb.cube.ra` and `haflux` finds `mangadapdb.junk5.emline_gflux_ha_6564`.

use rustc_hash::FxHashMap;
use std::fmt;
use tracing::debug;

use super::config::SurveyConfig;

/// Schema that holds the per-release DAP junk tables
const DAP_JUNK_PREFIX: &str = "mangadapdb.junk";

/// Release whose DAP junk table carries no release digit
const UNVERSIONED_JUNK_RELEASE: u32 = 4;

/// Outcome of a lookup that did not fail outright
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult<'a, V> {
    /// Exactly one path matched
    Found(&'a V),
    /// No path matched
    NotFound,
    /// Several paths matched; sorted
    Ambiguous(Vec<String>),
}

/// Failed lookup of a parameter or function name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    NotFound(String),
    Ambiguous { key: String, matches: Vec<String> },
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::NotFound(key) => write!(f, "{key} does not match any column."),
            LookupError::Ambiguous { key, matches } => write!(
                f,
                "{key} matches multiple parameters in the lookup table: {}",
                matches.join(", ")
            ),
        }
    }
}

impl std::error::Error for LookupError {}

/// Shortcut expansion for lookup keys
///
/// Table shortcuts rewrite the second-last segment of a key, name shortcuts the last one.
/// Junk-table shortcuts are derived from the release and replaced on every refresh;
/// custom shortcuts survive refreshes.
#[derive(Debug, Clone)]
pub struct ShortcutTable {
    release: String,
    table: FxHashMap<String, String>,
    junk: FxHashMap<String, String>,
    name: FxHashMap<String, String>,
}

impl ShortcutTable {
    /// Default shortcuts for the selected release
    pub fn for_config(config: &SurveyConfig) -> Self {
        let mut shortcuts = Self {
            release: String::new(),
            table: FxHashMap::default(),
            junk: FxHashMap::default(),
            name: FxHashMap::default(),
        };
        shortcuts
            .table
            .insert("ifu".to_string(), "ifudesign".to_string());
        shortcuts
            .name
            .insert("haflux".to_string(), "emline_gflux_ha_6564".to_string());
        shortcuts.refresh(config);
        shortcuts
    }

    /// Add a table shortcut (second-last key segment)
    pub fn with_table_shortcut(mut self, from: &str, to: &str) -> Self {
        self.table.insert(from.to_string(), to.to_string());
        self
    }

    /// Add a name shortcut (last key segment)
    pub fn with_name_shortcut(mut self, from: &str, to: &str) -> Self {
        self.name.insert(from.to_string(), to.to_string());
        self
    }

    /// Release the junk shortcuts were derived from
    pub fn release(&self) -> &str {
        &self.release
    }

    /// Recompute the junk shortcuts for `config.release`
    fn refresh(&mut self, config: &SurveyConfig) {
        self.junk.clear();
        let current = config.release_number();
        let target = match current {
            Some(UNVERSIONED_JUNK_RELEASE) | None => "junk".to_string(),
            Some(digit) => format!("junk{digit}"),
        };
        for n in config.dap_release_numbers() {
            self.junk.insert(format!("junk{n}"), target.clone());
        }
        if target != "junk" {
            self.junk.insert("junk".to_string(), target);
        }
        self.release.clone_from(&config.release);
    }

    fn table_shortcut(&self, segment: &str) -> Option<&String> {
        self.table.get(segment).or_else(|| self.junk.get(segment))
    }

    /// Split a key on dots and apply the shortcuts
    pub fn expand(&self, key: &str) -> Vec<String> {
        let mut segments: Vec<String> = key.split('.').map(str::to_string).collect();
        let n = segments.len();
        if n >= 2 {
            if let Some(table) = self.table_shortcut(&segments[n - 2]) {
                segments[n - 2].clone_from(table);
            }
        }
        if let Some(name) = self.name.get(&segments[n - 1]) {
            segments[n - 1].clone_from(name);
        }
        segments
    }
}

/// Map of dotted paths to values, searchable by path suffix
#[derive(Debug, Clone)]
pub struct ParamLookup<V> {
    entries: FxHashMap<String, V>,
    /// Last path segment -> full paths ending in it
    by_column: FxHashMap<String, Vec<String>>,
    shortcuts: ShortcutTable,
}

impl<V> ParamLookup<V> {
    /// Empty lookup with the default shortcuts for `config`
    pub fn new(config: &SurveyConfig) -> Self {
        Self::with_shortcuts(ShortcutTable::for_config(config))
    }

    pub fn with_shortcuts(shortcuts: ShortcutTable) -> Self {
        Self {
            entries: FxHashMap::default(),
            by_column: FxHashMap::default(),
            shortcuts,
        }
    }

    /// Insert or replace the value at a full dotted path
    pub fn insert(&mut self, path: &str, value: V) {
        if self.entries.insert(path.to_string(), value).is_none() {
            let column = last_segment(path).to_string();
            self.by_column
                .entry(column)
                .or_default()
                .push(path.to_string());
        }
    }

    /// Keep only the paths for which `keep` returns true
    pub fn retain<F: Fn(&str) -> bool>(&mut self, keep: F) {
        self.entries.retain(|path, _| keep(path));
        for paths in self.by_column.values_mut() {
            paths.retain(|path| keep(path));
        }
        self.by_column.retain(|_, paths| !paths.is_empty());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// All full paths, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn shortcuts(&self) -> &ShortcutTable {
        &self.shortcuts
    }

    /// Look a key up by path suffix
    pub fn get(&self, key: &str) -> LookupResult<'_, V> {
        let mut matches = self.matches(&self.shortcuts.expand(key));

        if matches.iter().any(|m| m.starts_with(DAP_JUNK_PREFIX)) {
            let first = matches[0].clone();
            debug!("Re-matching {} through DAP table {}", key, first);
            matches = self.matches(&self.shortcuts.expand(&first));
        }

        match matches.as_slice() {
            [] => LookupResult::NotFound,
            [path] => self
                .entries
                .get(path)
                .map_or(LookupResult::NotFound, LookupResult::Found),
            _ => LookupResult::Ambiguous(matches),
        }
    }

    /// Look a key up, turning misses and ambiguity into errors
    ///
    /// # Errors
    ///
    /// - `LookupError::NotFound` if no path matches
    /// - `LookupError::Ambiguous` if more than one path matches
    pub fn resolve(&self, key: &str) -> Result<&V, LookupError> {
        match self.get(key) {
            LookupResult::Found(value) => Ok(value),
            LookupResult::NotFound => Err(LookupError::NotFound(key.to_string())),
            LookupResult::Ambiguous(matches) => Err(LookupError::Ambiguous {
                key: key.to_string(),
                matches,
            }),
        }
    }

    /// Rebuild the release-derived shortcuts if `config` selects another release
    ///
    /// Returns true when a rebuild happened.
    pub fn rebuild_if_stale(&mut self, config: &SurveyConfig) -> bool {
        if self.shortcuts.release() == config.release {
            return false;
        }
        debug!(
            "Release changed from {} to {}, rebuilding shortcuts",
            self.shortcuts.release(),
            config.release
        );
        self.shortcuts.refresh(config);
        true
    }

    /// Paths whose trailing segments equal `segments`, sorted
    fn matches(&self, segments: &[String]) -> Vec<String> {
        let Some(last) = segments.last() else {
            return Vec::new();
        };
        let mut found: Vec<String> = self
            .by_column
            .get(last)
            .into_iter()
            .flatten()
            .filter(|path| {
                let parts: Vec<&str> = path.split('.').collect();
                parts.len() >= segments.len()
                    && parts
                        .iter()
                        .rev()
                        .zip(segments.iter().rev())
                        .all(|(p, s)| *p == s.as_str())
            })
            .cloned()
            .collect();
        found.sort_unstable();
        found
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Case-insensitive lookup of query function names
#[derive(Debug, Clone)]
pub struct FunctionLookup {
    functions: FxHashMap<String, String>,
}

impl Default for FunctionLookup {
    fn default() -> Self {
        Self::empty().with_function("npergood", "getPercent")
    }
}

impl FunctionLookup {
    pub fn empty() -> Self {
        Self {
            functions: FxHashMap::default(),
        }
    }

    /// Register `name` (matched case-insensitively) for `function`
    pub fn with_function(mut self, name: &str, function: &str) -> Self {
        self.functions
            .insert(name.to_lowercase(), function.to_string());
        self
    }

    /// # Errors
    ///
    /// Returns `LookupError::NotFound` if no function is registered under `name`
    pub fn get(&self, name: &str) -> Result<&str, LookupError> {
        self.functions
            .get(&name.to_lowercase())
            .map(String::as_str)
            .ok_or_else(|| LookupError::NotFound(name.to_string()))
    }
}
