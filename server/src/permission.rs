//! The permission oracle consulted by every write route before the core is
//! invoked (§6: "Consult the permission oracle before invoking the core for
//! any write operation").
//!
//! The core itself never sees a role string — RBAC is entirely an adapter
//! concern, injected as a trait so deployments can swap in a different
//! authorization backend without touching the route handlers.

/// Decides whether `role` may perform `permission` (`"task.<action>"`,
/// `"deliverable.<op>"`, `"fix.<source>"`).
pub trait PermissionOracle: Send + Sync {
    fn is_allowed(&self, permission: &str, role: &str) -> bool;
}

/// Permission table: one entry per action/operation, same shape as the
/// reference implementation's `rbac.py::ALLOW`. An action missing from this
/// table is forbidden for every role.
const ALLOW: &[(&str, &[&str])] = &[
    ("task.create", &["system", "lead", "supervisor"]),
    ("task.unblock", &["system", "lead"]),
    ("task.self_assign", &["executor", "lead"]),
    ("task.assign", &["lead", "supervisor"]),
    ("task.unassign", &["lead", "supervisor"]),
    ("task.start", &["executor", "lead"]),
    ("task.submit", &["executor", "lead"]),
    ("task.review_approve", &["lead", "supervisor"]),
    ("task.review_reject", &["lead", "supervisor"]),
    ("task.shift_release", &["lead", "supervisor"]),
    ("task.recall_to_pool", &["lead", "supervisor"]),
    ("task.escalate", &["executor", "lead", "supervisor"]),
    ("task.cancel", &["lead", "supervisor"]),
    ("deliverable.bootstrap", &["system", "lead"]),
    ("deliverable.signoff", &["system", "lead", "supervisor"]),
    ("deliverable.submit_to_qc", &["system", "lead", "supervisor"]),
    ("deliverable.qc_decision", &["system", "lead", "supervisor"]),
    ("fix.worker_initiative", &["executor", "lead"]),
    ("fix.supervisor_request", &["lead", "supervisor"]),
];

/// Static, in-memory permission table mirroring the reference RBAC map.
/// Sufficient for the single-process deployments this crate targets; a
/// production rollout with per-tenant role overrides would implement
/// [`PermissionOracle`] against a config or directory service instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticRoleOracle;

impl PermissionOracle for StaticRoleOracle {
    fn is_allowed(&self, permission: &str, role: &str) -> bool {
        ALLOW
            .iter()
            .find(|(perm, _)| *perm == permission)
            .is_some_and(|(_, roles)| roles.contains(&role))
    }
}
