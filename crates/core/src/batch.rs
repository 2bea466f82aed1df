//! Read-time batch aggregation.
//!
//! A batch never stores status. Whenever a client polls, the member
//! jobs' `(status, progress)` pairs are reduced to a [`BatchRollup`].
//! Idempotent and side-effect free.

use serde::Serialize;

use crate::status::{BatchStatus, JobStatus};

/// Derived aggregate view of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRollup {
    pub total_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    /// Rounded mean of member progress; 0 for an empty batch.
    pub overall_progress: u8,
    pub status: BatchStatus,
}

/// Reduce member `(status, progress)` pairs to the batch view.
///
/// Members whose rows do not exist yet must be passed as
/// `(JobStatus::Queued, 0)` by the caller.
pub fn aggregate(members: &[(JobStatus, u8)]) -> BatchRollup {
    let total_jobs = members.len();
    let completed_jobs = members
        .iter()
        .filter(|(status, _)| *status == JobStatus::Done)
        .count();
    let failed_jobs = members
        .iter()
        .filter(|(status, _)| *status == JobStatus::Failed)
        .count();

    let overall_progress = if total_jobs == 0 {
        0
    } else {
        let sum: u32 = members.iter().map(|(_, progress)| *progress as u32).sum();
        (sum as f64 / total_jobs as f64).round() as u8
    };

    let status = if completed_jobs + failed_jobs < total_jobs {
        BatchStatus::Processing
    } else if failed_jobs == 0 {
        BatchStatus::Done
    } else {
        BatchStatus::PartialFailure
    };

    BatchRollup {
        total_jobs,
        completed_jobs,
        failed_jobs,
        overall_progress,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_terminal_batch_is_partial_failure() {
        let rollup = aggregate(&[
            (JobStatus::Done, 100),
            (JobStatus::Done, 100),
            (JobStatus::Failed, 100),
        ]);
        assert_eq!(rollup.status, BatchStatus::PartialFailure);
        assert_eq!(rollup.completed_jobs, 2);
        assert_eq!(rollup.failed_jobs, 1);
        assert_eq!(rollup.overall_progress, 100);
    }

    #[test]
    fn any_nonterminal_member_keeps_the_batch_processing() {
        let rollup = aggregate(&[
            (JobStatus::Done, 100),
            (JobStatus::Queued, 0),
            (JobStatus::Running, 50),
        ]);
        assert_eq!(rollup.status, BatchStatus::Processing);
        assert_eq!(rollup.overall_progress, 50);
    }

    #[test]
    fn all_done_batch_is_done() {
        let rollup = aggregate(&[(JobStatus::Done, 100), (JobStatus::Done, 100)]);
        assert_eq!(rollup.status, BatchStatus::Done);
        assert_eq!(rollup.failed_jobs, 0);
    }

    #[test]
    fn empty_batch_reports_zero_progress() {
        let rollup = aggregate(&[]);
        assert_eq!(rollup.total_jobs, 0);
        assert_eq!(rollup.overall_progress, 0);
        assert_eq!(rollup.status, BatchStatus::Done);
    }

    #[test]
    fn mean_progress_is_rounded() {
        // (20 + 30 + 30) / 3 = 26.67 -> 27
        let rollup = aggregate(&[
            (JobStatus::Running, 20),
            (JobStatus::Running, 30),
            (JobStatus::Running, 30),
        ]);
        assert_eq!(rollup.overall_progress, 27);
    }
}
