//! Solution records as returned by the Dataverse Web API.

use serde::{Deserialize, Serialize};

/// A solution row from the `solutions` entity set.
///
/// Field values are taken verbatim from the remote system; the unique name is
/// an opaque key, the friendly name is display-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionRecord {
    #[serde(rename = "uniquename")]
    pub unique_name: String,
    #[serde(rename = "friendlyname")]
    pub friendly_name: String,
    #[serde(rename = "version")]
    pub version: String,
}

impl SolutionRecord {
    pub fn new(
        unique_name: impl Into<String>,
        friendly_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            unique_name: unique_name.into(),
            friendly_name: friendly_name.into(),
            version: version.into(),
        }
    }

    /// The synthesized list display string, `"uniquename (friendlyname)"`.
    ///
    /// Check-state in the selection UI is keyed by this string.
    pub fn display_string(&self) -> String {
        format!("{} ({})", self.unique_name, self.friendly_name)
    }
}
