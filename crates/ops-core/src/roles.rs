//! Workbench role assignments and the coverage engine.
//!
//! Every workbench should have at least one active holder of each standard
//! [`Role`]. Coverage is the share of the four roles with a holder, and a
//! workbench's gaps are the roles still vacant. Removal is a soft delete:
//! the row is kept with `is_active = 0`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, ErrorCode};
use serde::{Deserialize, Serialize};

use crate::error::{OpsError, Result};
use crate::store::{fetch_workbench, get_ts, now_ts, Store};
use crate::types::Role;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// One active role held by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub workbench_id: i64,
    pub workbench_name: String,
    pub role: Role,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleHolder {
    pub agent: String,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: String,
}

/// Active holders of every standard role in one workbench.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkbenchRoles {
    pub workbench_id: i64,
    pub workbench_name: String,
    pub description: Option<String>,
    /// Keyed by all four roles; vacant roles map to an empty list.
    pub roles: BTreeMap<Role, Vec<RoleHolder>>,
    pub total_assignments: usize,
    pub missing_roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkbenchCoverage {
    pub workbench_id: i64,
    pub workbench_name: String,
    pub assessors: usize,
    pub reviewers: usize,
    pub team_leads: usize,
    pub viewers: usize,
    pub total_assignments: usize,
    pub roles_filled: usize,
    pub coverage_percentage: f64,
    pub gaps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub workbenches: Vec<WorkbenchCoverage>,
    pub total_workbenches: usize,
    pub total_role_gaps: usize,
    pub fully_covered_workbenches: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSuggestion {
    pub workbench_id: i64,
    pub workbench_name: String,
    pub role: Role,
    pub suggested_agent: Option<String>,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Coverage math
// ---------------------------------------------------------------------------

/// Build a coverage row from active-assignment counts per role, indexed in
/// [`Role::all`] order.
pub fn coverage_summary(workbench_id: i64, workbench_name: &str, counts: [usize; 4]) -> WorkbenchCoverage {
    let standard = Role::count();
    let filled = counts.iter().filter(|&&n| n > 0).count();
    WorkbenchCoverage {
        workbench_id,
        workbench_name: workbench_name.to_string(),
        assessors: counts[0],
        reviewers: counts[1],
        team_leads: counts[2],
        viewers: counts[3],
        total_assignments: counts.iter().sum(),
        roles_filled: filled,
        coverage_percentage: filled as f64 / standard as f64 * 100.0,
        gaps: standard - filled.min(standard),
    }
}

fn role_index(role: Role) -> usize {
    Role::all().iter().position(|&r| r == role).unwrap_or(0)
}

fn parse_role_column(idx: usize, raw: String) -> rusqlite::Result<Role> {
    raw.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ---------------------------------------------------------------------------
// Store operations
// ---------------------------------------------------------------------------

impl Store {
    /// Give `agent` `role` in a workbench.
    ///
    /// Returns `false` when the same assignment is already active. The agent
    /// is registered if unknown.
    pub fn assign_workbench_role(
        &self,
        agent: &str,
        workbench_id: i64,
        role: Role,
        assigned_by: &str,
    ) -> Result<bool> {
        let agent = agent.trim();
        if agent.is_empty() {
            return Err(OpsError::InvalidArgument("agent must not be empty".into()));
        }
        let conn = self.conn()?;
        if fetch_workbench(&conn, workbench_id)?.is_none() {
            return Err(OpsError::WorkbenchNotFound(workbench_id));
        }
        conn.execute(
            "INSERT OR IGNORE INTO agent (name, created_at) VALUES (?1, ?2)",
            params![agent, now_ts()],
        )?;
        let inserted = conn.execute(
            "INSERT INTO workbench_roles (workbench_id, agent, role, assigned_at, assigned_by)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![workbench_id, agent, role.as_str(), now_ts(), assigned_by],
        );
        match inserted {
            Ok(_) => {
                tracing::info!(agent, workbench_id, role = %role, "role assigned");
                Ok(true)
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                tracing::debug!(agent, workbench_id, role = %role, "role already active");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deactivate an assignment. Returns `false` when nothing active matched.
    pub fn remove_workbench_role(&self, agent: &str, workbench_id: i64, role: Role) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE workbench_roles SET is_active = 0
             WHERE workbench_id = ?1 AND agent = ?2 AND role = ?3 AND is_active = 1",
            params![workbench_id, agent, role.as_str()],
        )?;
        if changed > 0 {
            tracing::info!(agent, workbench_id, role = %role, "role removed");
        }
        Ok(changed > 0)
    }

    /// Active roles held by `agent`, ordered by workbench name then role.
    pub fn get_agent_workbench_roles(&self, agent: &str) -> Result<Vec<RoleAssignment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT wr.workbench_id, w.name, wr.role, wr.assigned_at
             FROM workbench_roles wr
             JOIN workbench w ON w.id = wr.workbench_id
             WHERE wr.agent = ?1 AND wr.is_active = 1
             ORDER BY w.name, wr.role",
        )?;
        let rows = stmt.query_map(params![agent], |row| {
            Ok(RoleAssignment {
                workbench_id: row.get(0)?,
                workbench_name: row.get(1)?,
                role: parse_role_column(2, row.get(2)?)?,
                assigned_at: get_ts(row, 3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Holders of each role in a workbench, or `None` for an unknown id.
    pub fn get_workbench_role_assignments(&self, workbench_id: i64) -> Result<Option<WorkbenchRoles>> {
        let conn = self.conn()?;
        let Some(workbench) = fetch_workbench(&conn, workbench_id)? else {
            return Ok(None);
        };
        let mut stmt = conn.prepare(
            "SELECT agent, role, assigned_at, assigned_by
             FROM workbench_roles
             WHERE workbench_id = ?1 AND is_active = 1
             ORDER BY role, agent",
        )?;
        let rows = stmt.query_map(params![workbench_id], |row| {
            Ok((
                parse_role_column(1, row.get(1)?)?,
                RoleHolder {
                    agent: row.get(0)?,
                    assigned_at: get_ts(row, 2)?,
                    assigned_by: row.get(3)?,
                },
            ))
        })?;

        let mut roles: BTreeMap<Role, Vec<RoleHolder>> =
            Role::all().iter().map(|&r| (r, Vec::new())).collect();
        let mut total = 0;
        for row in rows {
            let (role, holder) = row?;
            roles.entry(role).or_default().push(holder);
            total += 1;
        }
        let missing_roles = Role::all()
            .iter()
            .copied()
            .filter(|r| roles.get(r).map_or(true, Vec::is_empty))
            .collect();

        Ok(Some(WorkbenchRoles {
            workbench_id,
            workbench_name: workbench.name,
            description: workbench.description,
            roles,
            total_assignments: total,
            missing_roles,
        }))
    }

    /// Coverage of every workbench plus aggregate totals.
    pub fn get_workbench_coverage_report(&self) -> Result<CoverageReport> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT w.id, w.name, wr.role, COUNT(wr.id)
             FROM workbench w
             LEFT JOIN workbench_roles wr ON wr.workbench_id = w.id AND wr.is_active = 1
             GROUP BY w.id, w.name, wr.role
             ORDER BY w.id",
        )?;
        let rows = stmt.query_map([], |row| {
            let role: Option<String> = row.get(2)?;
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                role.map(|r| parse_role_column(2, r)).transpose()?,
                row.get::<_, i64>(3)? as usize,
            ))
        })?;

        let mut order: Vec<(i64, String)> = Vec::new();
        let mut counts: BTreeMap<i64, [usize; 4]> = BTreeMap::new();
        for row in rows {
            let (id, name, role, n) = row?;
            let slot = counts.entry(id).or_insert_with(|| {
                order.push((id, name));
                [0; 4]
            });
            if let Some(role) = role {
                slot[role_index(role)] = n;
            }
        }

        let workbenches: Vec<WorkbenchCoverage> = order
            .iter()
            .map(|(id, name)| coverage_summary(*id, name, counts[id]))
            .collect();
        Ok(CoverageReport {
            total_workbenches: workbenches.len(),
            total_role_gaps: workbenches.iter().map(|w| w.gaps).sum(),
            fully_covered_workbenches: workbenches.iter().filter(|w| w.gaps == 0).count(),
            workbenches,
        })
    }

    /// Suggest an agent for every vacant role. The candidate is the first
    /// agent, by name, with no active role anywhere.
    pub fn suggest_role_assignments(&self) -> Result<Vec<RoleSuggestion>> {
        let candidate: Option<String> = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT name FROM agent
                 WHERE name NOT IN (SELECT agent FROM workbench_roles WHERE is_active = 1)
                 ORDER BY name LIMIT 1",
            )?;
            let mut rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
            let first = rows.next().transpose()?;
            first
        };

        let mut suggestions = Vec::new();
        for wb in self.get_workbench_coverage_report()?.workbenches {
            if wb.gaps == 0 {
                continue;
            }
            let Some(detail) = self.get_workbench_role_assignments(wb.workbench_id)? else {
                continue;
            };
            for role in detail.missing_roles {
                let reason = match &candidate {
                    Some(_) => format!("Fill {role} gap in {}", wb.workbench_name),
                    None => format!("Need {role} for {} - no available agents", wb.workbench_name),
                };
                suggestions.push(RoleSuggestion {
                    workbench_id: wb.workbench_id,
                    workbench_name: wb.workbench_name.clone(),
                    role,
                    suggested_agent: candidate.clone(),
                    reason,
                });
            }
        }
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewWorkbench;
    use crate::store::test_store;

    fn store_with_workbench() -> (tempfile::TempDir, Store, i64) {
        let (dir, store) = test_store();
        let wb = store
            .create_workbench(NewWorkbench {
                name: "Disputes".into(),
                description: None,
            })
            .unwrap();
        (dir, store, wb.id)
    }

    #[test]
    fn gaps_formula_holds_for_all_counts() {
        for a in 0..3 {
            for r in 0..3 {
                for t in 0..3 {
                    for v in 0..3 {
                        let c = coverage_summary(1, "w", [a, r, t, v]);
                        assert_eq!(c.gaps, 4 - c.roles_filled.min(4));
                        assert_eq!(c.coverage_percentage, c.roles_filled as f64 * 25.0);
                    }
                }
            }
        }
    }

    #[test]
    fn filling_a_vacant_role_never_lowers_coverage() {
        let mut counts = [0usize; 4];
        let mut last = coverage_summary(1, "w", counts).coverage_percentage;
        for i in 0..4 {
            counts[i] += 1;
            let now = coverage_summary(1, "w", counts).coverage_percentage;
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn duplicate_active_assignment_is_rejected() {
        let (_dir, store, wb) = store_with_workbench();
        assert!(store.assign_workbench_role("ashish", wb, Role::Assessor, "system").unwrap());
        assert!(!store.assign_workbench_role("ashish", wb, Role::Assessor, "system").unwrap());
    }

    #[test]
    fn assign_then_query_lists_agent_once() {
        let (_dir, store, wb) = store_with_workbench();
        store.assign_workbench_role("ashish", wb, Role::Assessor, "system").unwrap();
        store.assign_workbench_role("ashish", wb, Role::Assessor, "system").unwrap();

        let detail = store.get_workbench_role_assignments(wb).unwrap().unwrap();
        let holders = &detail.roles[&Role::Assessor];
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].agent, "ashish");
        assert_eq!(detail.total_assignments, 1);
        assert_eq!(
            detail.missing_roles,
            vec![Role::Reviewer, Role::TeamLead, Role::Viewer]
        );
    }

    #[test]
    fn soft_delete_removes_from_active_list() {
        let (_dir, store, wb) = store_with_workbench();
        store.assign_workbench_role("ashish", wb, Role::Reviewer, "cli").unwrap();
        assert!(store.remove_workbench_role("ashish", wb, Role::Reviewer).unwrap());
        assert!(!store.remove_workbench_role("ashish", wb, Role::Reviewer).unwrap());

        let detail = store.get_workbench_role_assignments(wb).unwrap().unwrap();
        assert!(detail.roles[&Role::Reviewer].is_empty());
        assert!(store.get_agent_workbench_roles("ashish").unwrap().is_empty());

        // Re-assigning after removal is allowed.
        assert!(store.assign_workbench_role("ashish", wb, Role::Reviewer, "cli").unwrap());
    }

    #[test]
    fn unknown_workbench() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.assign_workbench_role("ashish", 42, Role::Viewer, "system"),
            Err(OpsError::WorkbenchNotFound(42))
        ));
        assert!(store.get_workbench_role_assignments(42).unwrap().is_none());
    }

    #[test]
    fn coverage_report_counts_distinct_roles() {
        let (_dir, store, wb) = store_with_workbench();
        store
            .create_workbench(NewWorkbench {
                name: "Refunds".into(),
                description: None,
            })
            .unwrap();
        store.assign_workbench_role("a", wb, Role::Assessor, "system").unwrap();
        store.assign_workbench_role("b", wb, Role::Assessor, "system").unwrap();
        store.assign_workbench_role("c", wb, Role::TeamLead, "system").unwrap();

        let report = store.get_workbench_coverage_report().unwrap();
        assert_eq!(report.total_workbenches, 2);
        let first = &report.workbenches[0];
        assert_eq!(first.assessors, 2);
        assert_eq!(first.team_leads, 1);
        assert_eq!(first.total_assignments, 3);
        assert_eq!(first.coverage_percentage, 50.0);
        assert_eq!(first.gaps, 2);
        assert_eq!(report.workbenches[1].gaps, 4);
        assert_eq!(report.total_role_gaps, 6);
        assert_eq!(report.fully_covered_workbenches, 0);
    }

    #[test]
    fn agent_roles_are_ordered_by_workbench_name() {
        let (_dir, store, disputes) = store_with_workbench();
        let appeals = store
            .create_workbench(NewWorkbench {
                name: "Appeals".into(),
                description: None,
            })
            .unwrap()
            .id;
        store.assign_workbench_role("ashish", disputes, Role::Viewer, "system").unwrap();
        store.assign_workbench_role("ashish", appeals, Role::Reviewer, "system").unwrap();

        let roles = store.get_agent_workbench_roles("ashish").unwrap();
        let names: Vec<_> = roles.iter().map(|r| r.workbench_name.as_str()).collect();
        assert_eq!(names, vec!["Appeals", "Disputes"]);
    }

    #[test]
    fn suggestions_use_unassigned_agents() {
        let (_dir, store, wb) = store_with_workbench();
        store.assign_workbench_role("busy", wb, Role::Assessor, "system").unwrap();
        store.create_agent("free", None, None).unwrap();

        let suggestions = store.suggest_role_assignments().unwrap();
        assert_eq!(suggestions.len(), 3);
        assert!(suggestions
            .iter()
            .all(|s| s.suggested_agent.as_deref() == Some("free")));
        assert_eq!(suggestions[0].role, Role::Reviewer);
    }

    #[test]
    fn suggestions_without_candidates_explain_why() {
        let (_dir, store, wb) = store_with_workbench();
        store.assign_workbench_role("busy", wb, Role::Assessor, "system").unwrap();
        let suggestions = store.suggest_role_assignments().unwrap();
        assert!(suggestions.iter().all(|s| s.suggested_agent.is_none()));
        assert!(suggestions[0].reason.contains("no available agents"));
    }
}
