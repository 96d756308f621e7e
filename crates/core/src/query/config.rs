//! Survey release configuration for the lookup layer
//!
//! Passed explicitly to the lookup constructors; components compare the release they were
//! built for against the current one and rebuild on change.

use serde::{Deserialize, Serialize};

/// Releases known to the default configuration, oldest first
const DEFAULT_RELEASES: [&str; 5] = ["MPL-1", "MPL-2", "MPL-3", "MPL-4", "MPL-5"];

/// First release whose DAP tables are exposed as `junk` tables
pub const FIRST_DAP_RELEASE: u32 = 4;

/// Selected survey release and the releases known to exist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    /// Release currently in use (e.g. `MPL-5`)
    pub release: String,
    /// All known releases
    pub releases: Vec<String>,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            release: "MPL-5".to_string(),
            releases: DEFAULT_RELEASES.iter().map(|r| (*r).to_string()).collect(),
        }
    }
}

impl SurveyConfig {
    /// Default release list with `release` selected
    pub fn with_release(release: &str) -> Self {
        Self {
            release: release.to_string(),
            ..Default::default()
        }
    }

    /// Parse a JSON configuration; missing fields take their defaults
    ///
    /// # Errors
    /// Returns the serde error if the text is not valid JSON for this struct
    pub fn from_json_str(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Number after the dash of the selected release (`MPL-5` -> 5)
    pub fn release_number(&self) -> Option<u32> {
        release_number(&self.release)
    }

    /// Known releases with a DAP junk table, as numbers
    pub fn dap_release_numbers(&self) -> Vec<u32> {
        self.releases
            .iter()
            .filter_map(|r| release_number(r))
            .filter(|n| *n >= FIRST_DAP_RELEASE)
            .collect()
    }
}

/// Number after the last dash of a release name
pub fn release_number(release: &str) -> Option<u32> {
    release.rsplit('-').next()?.parse().ok()
}
