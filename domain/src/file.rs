//! Domain definition files
//!
//! A domain file names the issues and their values and may carry a hidden
//! additive preference profile for simulation:
//!
//! ```toml
//! name = "party"
//!
//! [[issues]]
//! name = "food"
//! values = ["chips", "pizza", "sushi"]
//!
//! [profile]
//! reservation = 0.2
//!
//! [profile.issues.food]
//! weight = 0.5
//! evaluations = { chips = 0.0, pizza = 0.5, sushi = 1.0 }
//! ```
//!
//! Issue numbers default to the 1-based position in the file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use parley_engine::{Domain, Issue, IssueId};

use crate::error::{DomainFileError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainFile {
    pub name: String,
    pub issues: Vec<IssueSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<IssueId>,
    pub name: String,
    pub values: Vec<String>,
}

/// Hidden preferences, keyed by issue name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileSpec {
    #[serde(default)]
    pub reservation: f64,
    pub issues: BTreeMap<String, IssueProfileSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueProfileSpec {
    pub weight: f64,
    pub evaluations: BTreeMap<String, f64>,
}

impl DomainFile {
    /// Load a `.toml` or `.json` file, chosen by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| DomainFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text)?,
            Some("json") => Self::from_json_str(&text)?,
            _ => return Err(DomainFileError::UnsupportedFormat(path.to_path_buf())),
        };
        debug!(path = %path.display(), issues = file.issues.len(), "loaded domain file");
        Ok(file)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Engine-level domain. Structural checks happen when the engine builds
    /// its outcome index.
    pub fn to_domain(&self) -> Domain {
        let issues = self
            .issues
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let number = spec.number.unwrap_or(i as IssueId + 1);
                Issue::discrete(number, spec.name.clone(), spec.values.clone())
            })
            .collect();
        Domain::new(self.name.clone(), issues)
    }
}
