//! Filter and selection state for the solution list.
//!
//! One data structure owns the full retrieved list, the live filter string,
//! the select-all flag, and the set of individually checked items (keyed by
//! display string). The displayed subset is recomputed on demand, so
//! check-state survives any sequence of filter changes for items whose
//! display string is unchanged.

use std::collections::HashSet;

use crate::dataverse::SolutionRecord;

/// One row of the displayed, filtered solution list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayItem {
    /// `"uniquename (friendlyname)"`, the check-state key.
    pub display: String,
    pub unique_name: String,
    pub version: String,
    pub checked: bool,
}

/// Selection state over the most recently retrieved solution list.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    solutions: Vec<SolutionRecord>,
    filter: String,
    select_all: bool,
    checked: HashSet<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the full list after a (re)connect.
    ///
    /// Individual checks and the select-all flag are reset; the filter text
    /// is kept, matching the form's behavior.
    pub fn set_solutions(&mut self, solutions: Vec<SolutionRecord>) {
        self.solutions = solutions;
        self.checked.clear();
        self.select_all = false;
    }

    /// All retrieved solutions, unfiltered.
    pub fn solutions(&self) -> &[SolutionRecord] {
        &self.solutions
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    pub fn is_select_all(&self) -> bool {
        self.select_all
    }

    /// Whether manual per-item interaction is allowed.
    pub fn list_enabled(&self) -> bool {
        !self.select_all
    }

    /// Toggle select-all: checked forces every displayed item on, unchecked
    /// clears every check regardless of prior manual state.
    pub fn set_select_all(&mut self, select_all: bool) {
        self.select_all = select_all;
        self.checked.clear();
        if select_all {
            let displays: Vec<String> = self
                .filtered_records()
                .iter()
                .map(|r| r.display_string())
                .collect();
            self.checked.extend(displays);
        }
    }

    /// Toggle one displayed item by display string.
    ///
    /// No-op while select-all is active or if the item is not currently
    /// displayed. Returns whether the state changed.
    pub fn toggle(&mut self, display: &str) -> bool {
        if self.select_all {
            return false;
        }
        let displayed = self
            .filtered_records()
            .iter()
            .any(|r| r.display_string() == display);
        if !displayed {
            return false;
        }
        if !self.checked.insert(display.to_string()) {
            self.checked.remove(display);
        }
        true
    }

    /// The displayed list under the current filter, with check-state.
    pub fn displayed(&self) -> Vec<DisplayItem> {
        self.filtered_records()
            .into_iter()
            .map(|record| {
                let display = record.display_string();
                let checked = self.select_all || self.checked.contains(&display);
                DisplayItem {
                    unique_name: record.unique_name.clone(),
                    version: record.version.clone(),
                    checked,
                    display,
                }
            })
            .collect()
    }

    /// Unique names selected for export.
    ///
    /// With select-all active this is ALL retrieved solutions, not just the
    /// filtered subset; otherwise it is every checked item, resolved back to
    /// its record by display string.
    pub fn selected_unique_names(&self) -> Vec<String> {
        if self.select_all {
            return self
                .solutions
                .iter()
                .map(|r| r.unique_name.clone())
                .collect();
        }
        self.solutions
            .iter()
            .filter(|r| self.checked.contains(&r.display_string()))
            .map(|r| r.unique_name.clone())
            .collect()
    }

    pub fn has_selection(&self) -> bool {
        if self.select_all {
            !self.solutions.is_empty()
        } else {
            !self.checked.is_empty()
        }
    }

    fn filtered_records(&self) -> Vec<&SolutionRecord> {
        let needle = self.filter.trim().to_lowercase();
        self.solutions
            .iter()
            .filter(|record| {
                if needle.is_empty() {
                    return true;
                }
                record.unique_name.to_lowercase().contains(&needle)
                    || record.friendly_name.to_lowercase().contains(&needle)
            })
            .collect()
    }
}
