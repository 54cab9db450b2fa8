#![forbid(unsafe_code)]
//! Read-only consistency audit over a filesystem metadata snapshot.
//!
//! Three passes run in a fixed order over the same immutable [`Snapshot`]:
//! block consistency, inode allocation, then directory structure, which
//! consumes the allocated-inode set the second pass produced. Each pass is a
//! pure scan whose only output is an ordered list of [`Finding`]s; running
//! the audit twice over the same snapshot yields identical transcripts.
//!
//! Findings are expected, user-facing output, not failures: a pass never
//! aborts early, and overlapping anomalies are all reported.

pub mod blocks;
pub mod directories;
pub mod finding;
pub mod inodes;

pub use blocks::audit_blocks;
pub use directories::audit_directories;
pub use finding::{BlockOwner, BlockRef, Finding, RefKind};
pub use inodes::audit_inode_allocation;

use fsa_types::Snapshot;
use tracing::debug;

/// Run all three audit passes and collect their findings in emission order.
#[must_use]
pub fn run_audit(snapshot: &Snapshot) -> Vec<Finding> {
    let mut findings = audit_blocks(snapshot);
    debug!(findings = findings.len(), "block consistency pass complete");

    let (inode_findings, allocated) = audit_inode_allocation(snapshot);
    debug!(
        findings = inode_findings.len(),
        allocated = allocated.len(),
        "inode allocation pass complete"
    );
    findings.extend(inode_findings);

    let directory_findings = audit_directories(snapshot, &allocated);
    debug!(
        findings = directory_findings.len(),
        "directory structure pass complete"
    );
    findings.extend(directory_findings);

    findings
}
