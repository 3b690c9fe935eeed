//! Schedulers for the groups of one dispatch.

use crate::error::DispatchError;
use crate::finalize::Finalization;
use crate::kernel::{DispatchContext, GroupTask, Step};
use glam::Vec4;
use std::sync::atomic::{AtomicBool, Ordering};
use std::{hint, thread};

/// Spins between two yields of a blocked group thread.
const SPINS_PER_YIELD: u64 = 64;

/// How the groups of a dispatch are executed by the CPU model.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Schedule {
    /// One OS thread per group, all running concurrently. A blocked
    /// look-back spins, yielding now and then, until
    /// [`RunParams::spin_limit`](crate::RunParams::spin_limit) reads in a row
    /// came back `NotReady`.
    #[default]
    Threaded,
    /// Deterministic single-threaded execution. Every scheduler round steps
    /// each unfinished group once, in the given order of group indices,
    /// which must name every group exactly once.
    Interleaved(Vec<u32>),
}

impl Schedule {
    /// Interleaving in group order.
    pub fn in_order(groups: u32) -> Self {
        Self::Interleaved((0..groups).collect())
    }

    /// Interleaving in reverse group order: every group starts its look-back
    /// before its predecessors have published anything.
    pub fn reversed(groups: u32) -> Self {
        Self::Interleaved((0..groups).rev().collect())
    }
}

/// What a dispatch of the CPU model did.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DispatchReport {
    pub cluster: u32,
    pub groups: u32,
    /// Grand total `(r, g, b, count)` over the cluster's pixels; `None` when
    /// the early-exit guard fired.
    pub total: Option<Vec4>,
    pub finalization: Option<Finalization>,
    /// Converged centroids written to the trailing slot, when this dispatch
    /// closed the round.
    pub round: Option<u32>,
}

impl DispatchReport {
    pub fn exited_early(&self) -> bool {
        self.total.is_none()
    }

    fn collect(cx: &DispatchContext<'_>, tasks: &[GroupTask]) -> Self {
        let outcome = tasks.iter().find_map(GroupTask::outcome);
        debug_assert!(outcome.is_some() || tasks.iter().all(GroupTask::exited));
        Self {
            cluster: cx.cluster,
            groups: cx.groups,
            total: outcome.map(|outcome| outcome.total),
            finalization: outcome.map(|outcome| outcome.finalization),
            round: outcome.and_then(|outcome| outcome.round),
        }
    }
}

pub(crate) fn run(
    cx: &DispatchContext<'_>,
    schedule: &Schedule,
) -> Result<DispatchReport, DispatchError> {
    let tasks = match schedule {
        Schedule::Threaded => run_threaded(cx)?,
        Schedule::Interleaved(order) => run_interleaved(cx, order)?,
    };
    Ok(DispatchReport::collect(cx, &tasks))
}

/// Raises the abort flag if the owning group thread unwinds, so that the
/// groups spinning on it give up instead of burning their spin budget.
struct AbortOnPanic<'a>(&'a AtomicBool);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::Relaxed);
        }
    }
}

fn run_threaded(cx: &DispatchContext<'_>) -> Result<Vec<GroupTask>, DispatchError> {
    run_threaded_with(cx, |cx, group, abort| {
        drive_group(cx, GroupTask::new(group), cx.params.spin_limit, abort)
    })
}

/// Runs `drive` for every group on its own scoped thread and collects the
/// finished tasks.
fn run_threaded_with<F>(
    cx: &DispatchContext<'_>,
    drive: F,
) -> Result<Vec<GroupTask>, DispatchError>
where
    F: Fn(&DispatchContext<'_>, u32, &AtomicBool) -> Result<Option<GroupTask>, DispatchError>
        + Sync,
{
    let abort = AtomicBool::new(false);
    let span = tracing::Span::current();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..cx.groups)
            .map(|group| {
                let (abort, span, drive) = (&abort, span.clone(), &drive);
                scope.spawn(move || {
                    let _enter = span.enter();
                    let _guard = AbortOnPanic(abort);
                    let result = drive(cx, group, abort);
                    if result.is_err() {
                        abort.store(true, Ordering::Relaxed);
                    }
                    result
                })
            })
            .collect();

        let mut tasks = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for (group, handle) in (0..).zip(handles) {
            match handle.join() {
                Ok(Ok(Some(task))) => tasks.push(task),
                // gave up because another group failed
                Ok(Ok(None)) => {}
                Ok(Err(err)) => {
                    first_error.get_or_insert(err);
                }
                Err(_) => {
                    first_error.get_or_insert(DispatchError::GroupPanicked { group });
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(tasks),
        }
    })
}

/// Steps one group to completion on the current thread.
///
/// Returns `Ok(None)` if another group raised the abort flag.
fn drive_group(
    cx: &DispatchContext<'_>,
    mut task: GroupTask,
    spin_limit: u64,
    abort: &AtomicBool,
) -> Result<Option<GroupTask>, DispatchError> {
    let mut spins = 0u64;
    loop {
        match task.step(cx) {
            Step::Progress => spins = 0,
            Step::Blocked { waiting_on } => {
                if abort.load(Ordering::Relaxed) {
                    return Ok(None);
                }
                spins += 1;
                if spins >= spin_limit {
                    tracing::warn!(group = task.group(), waiting_on, spins, "look-back livelock");
                    return Err(DispatchError::Livelock {
                        group: task.group(),
                        waiting_on,
                    });
                }
                if spins % SPINS_PER_YIELD == 0 {
                    thread::yield_now();
                } else {
                    hint::spin_loop();
                }
            }
            Step::Exited | Step::Finished => return Ok(Some(task)),
        }
    }
}

fn run_interleaved(
    cx: &DispatchContext<'_>,
    order: &[u32],
) -> Result<Vec<GroupTask>, DispatchError> {
    let mut seen = vec![false; cx.groups as usize];
    let is_permutation = order.len() == seen.len()
        && order.iter().all(|&group| match seen.get_mut(group as usize) {
            Some(seen) => !std::mem::replace(seen, true),
            None => false,
        });
    if !is_permutation {
        return Err(DispatchError::InvalidSchedule { groups: cx.groups });
    }

    let mut tasks: Vec<GroupTask> = (0..cx.groups).map(GroupTask::new).collect();
    while tasks.iter().any(|task| !task.is_done()) {
        let mut progressed = false;
        let mut blocked = None;
        for &group in order {
            let task = &mut tasks[group as usize];
            if task.is_done() {
                continue;
            }
            match task.step(cx) {
                Step::Blocked { waiting_on } => {
                    blocked.get_or_insert((group, waiting_on));
                }
                Step::Progress | Step::Exited | Step::Finished => progressed = true,
            }
        }
        if let (false, Some((group, waiting_on))) = (progressed, blocked) {
            tracing::warn!(group, waiting_on, "every group is blocked");
            return Err(DispatchError::Livelock { group, waiting_on });
        }
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunParams;
    use crate::convergence::{CentroidTable, ConvergenceVector};
    use crate::image::PixelGrid;
    use crate::store::GroupStore;

    fn with_context<R>(groups: u32, f: impl FnOnce(&DispatchContext<'_>) -> R) -> R {
        let params = RunParams {
            sequencing_factor: 1,
            workgroup_size: 4,
            spin_limit: 1000,
            ..RunParams::default()
        };
        let pixels = PixelGrid::solid(4 * groups, 1, Vec4::ONE);
        let assignment = vec![0; pixels.len()];
        let centroids = CentroidTable::new(&[Vec4::ZERO]);
        let convergence = ConvergenceVector::new(1);
        let store = GroupStore::new(groups);
        f(&DispatchContext {
            pixels: &pixels,
            assignment: &assignment,
            centroids: &centroids,
            convergence: &convergence,
            store: &store,
            params: &params,
            cluster: 0,
            epoch: 1,
            groups,
        })
    }

    #[test]
    fn rejects_orders_that_are_not_permutations() {
        with_context(3, |cx| {
            for order in [vec![0, 1], vec![0, 1, 1], vec![0, 1, 3], vec![2, 1, 0, 0]] {
                assert!(matches!(
                    run(cx, &Schedule::Interleaved(order)),
                    Err(DispatchError::InvalidSchedule { groups: 3 })
                ));
            }
        });
    }

    #[test]
    fn a_group_that_never_runs_is_reported_as_livelock() {
        with_context(2, |cx| {
            let abort = AtomicBool::new(false);
            let err = drive_group(cx, GroupTask::new(1), cx.params.spin_limit, &abort).unwrap_err();
            assert!(matches!(
                err,
                DispatchError::Livelock {
                    group: 1,
                    waiting_on: 0
                }
            ));
        });
    }

    #[test]
    fn blocked_groups_give_up_after_an_abort() {
        with_context(2, |cx| {
            let abort = AtomicBool::new(true);
            let result = drive_group(cx, GroupTask::new(1), u64::MAX, &abort).unwrap();
            assert!(result.is_none());
        });
    }

    #[test]
    fn a_panicking_group_aborts_the_dispatch() {
        with_context(4, |cx| {
            let result = run_threaded_with(cx, |cx, group, abort| {
                if group == 0 {
                    panic!("group 0 failed before publishing");
                }
                drive_group(cx, GroupTask::new(group), u64::MAX, abort)
            });
            assert!(matches!(
                result,
                Err(DispatchError::GroupPanicked { group: 0 })
            ));
        });
    }

    #[test]
    fn schedules_agree() {
        let threaded = with_context(8, |cx| run(cx, &Schedule::Threaded).unwrap());
        let forward = with_context(8, |cx| run(cx, &Schedule::in_order(8)).unwrap());
        let backward = with_context(8, |cx| run(cx, &Schedule::reversed(8)).unwrap());
        assert_eq!(threaded.total, Some(Vec4::splat(32.0)));
        assert_eq!(threaded, forward);
        assert_eq!(forward, backward);
    }
}
