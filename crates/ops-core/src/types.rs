use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// The fixed workbench role taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Assessor,
    Reviewer,
    #[serde(rename = "Team Lead")]
    TeamLead,
    Viewer,
}

impl Role {
    pub fn all() -> &'static [Role] {
        &[Role::Assessor, Role::Reviewer, Role::TeamLead, Role::Viewer]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Assessor => "Assessor",
            Role::Reviewer => "Reviewer",
            Role::TeamLead => "Team Lead",
            Role::Viewer => "Viewer",
        }
    }

    /// Number of standard roles a workbench needs for full coverage.
    pub fn count() -> usize {
        Role::all().len()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect();
        match normalized.as_str() {
            "assessor" => Ok(Role::Assessor),
            "reviewer" => Ok(Role::Reviewer),
            "teamlead" => Ok(Role::TeamLead),
            "viewer" => Ok(Role::Viewer),
            _ => Err(crate::error::OpsError::InvalidRole(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Task status
// ---------------------------------------------------------------------------

/// Well-known task status values. Storage keeps status as a free string.
pub mod status {
    pub const ASSIGNED: &str = "assigned";
    pub const PENDING: &str = "pending";
    pub const IN_PROGRESS: &str = "in_progress";
    pub const COMPLETED: &str = "completed";

    /// Map loose spellings ("done", "in progress", "Complete") onto the
    /// canonical value. Unrecognised input is passed through lowercased.
    pub fn normalize(raw: &str) -> String {
        let lower = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match lower.as_str() {
            "done" | "complete" | "completed" | "finished" => COMPLETED.to_string(),
            "in_progress" | "inprogress" | "started" | "working" => IN_PROGRESS.to_string(),
            "assigned" => ASSIGNED.to_string(),
            "pending" | "todo" => PENDING.to_string(),
            _ => lower,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_loose_spellings() {
        for raw in ["team lead", "Team Lead", "team-lead", "TEAM_LEAD", "teamlead"] {
            assert_eq!(raw.parse::<Role>().unwrap(), Role::TeamLead, "{raw}");
        }
        assert_eq!("reviewer".parse::<Role>().unwrap(), Role::Reviewer);
        assert!("manager".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_with_display_name() {
        let json = serde_json::to_string(&Role::TeamLead).unwrap();
        assert_eq!(json, "\"Team Lead\"");
        assert_eq!(Role::TeamLead.to_string(), "Team Lead");
    }

    #[test]
    fn status_normalization() {
        assert_eq!(status::normalize("Done"), "completed");
        assert_eq!(status::normalize("in progress"), "in_progress");
        assert_eq!(status::normalize("blocked"), "blocked");
    }
}
