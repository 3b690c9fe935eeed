//! One workgroup of the centroid update kernel, executed on the CPU.
//!
//! A [`GroupTask`] advances one protocol action per [`GroupTask::step`], so a
//! scheduler can run groups on real threads or interleave them in any order.
//! Lanes within a group run in lockstep; everything a GPU group does between
//! two cross-group interactions is a single step.

use crate::accumulate::masked_accumulate;
use crate::config::RunParams;
use crate::convergence::{CentroidTable, ConvergenceVector};
use crate::finalize::{Finalization, finalize};
use crate::image::PixelGrid;
use crate::layout::GroupStatus;
use crate::lookback::{LookBack, LookBackPoll};
use crate::scan::inclusive_scan;
use crate::store::GroupStore;
use glam::Vec4;

/// Everything bound to one dispatch.
#[derive(Copy, Clone, Debug)]
pub(crate) struct DispatchContext<'a> {
    pub pixels: &'a PixelGrid,
    pub assignment: &'a [u32],
    pub centroids: &'a CentroidTable,
    pub convergence: &'a ConvergenceVector,
    pub store: &'a GroupStore,
    pub params: &'a RunParams,
    pub cluster: u32,
    pub epoch: u32,
    pub groups: u32,
}

impl DispatchContext<'_> {
    fn is_last_group(&self, group: u32) -> bool {
        group + 1 == self.groups
    }
}

/// What a single step did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Progress,
    /// Look-back read a `NotReady` flag.
    Blocked { waiting_on: u32 },
    /// The early-exit guard fired; the group did nothing.
    Exited,
    Finished,
}

#[derive(Clone, Debug)]
enum Phase {
    Entry,
    Reduce,
    LookBack(LookBack),
    Finalize { exclusive: Vec4 },
    Done,
}

/// The outcome of the one group that finalized.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct FinalOutcome {
    pub total: Vec4,
    pub finalization: Finalization,
    pub round: Option<u32>,
}

#[derive(Clone, Debug)]
pub(crate) struct GroupTask {
    group: u32,
    phase: Phase,
    /// Inclusive value of the group's last lane, i.e. its local aggregate.
    local: Vec4,
    exited: bool,
    outcome: Option<FinalOutcome>,
}

impl GroupTask {
    pub fn new(group: u32) -> Self {
        Self {
            group,
            phase: Phase::Entry,
            local: Vec4::ZERO,
            exited: false,
            outcome: None,
        }
    }

    pub fn group(&self) -> u32 {
        self.group
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    pub fn exited(&self) -> bool {
        self.exited
    }

    pub fn outcome(&self) -> Option<FinalOutcome> {
        self.outcome
    }

    pub fn step(&mut self, cx: &DispatchContext<'_>) -> Step {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Entry => {
                // every lane sees the same trailing slot, so the whole group
                // leaves together
                if cx.convergence.round_complete() {
                    self.exited = true;
                    return Step::Exited;
                }
                cx.store.reset(self.group, cx.epoch);
                self.phase = Phase::Reduce;
                Step::Progress
            }
            Phase::Reduce => {
                self.local = self.reduce(cx);
                cx.store.publish_aggregate(self.group, self.local);
                if self.group == 0 {
                    cx.store.publish_prefix(0, self.local);
                    cx.store.set_status(0, GroupStatus::PrefixReady, cx.epoch);
                    self.resolved(cx, Vec4::ZERO)
                } else {
                    cx.store
                        .set_status(self.group, GroupStatus::AggregateReady, cx.epoch);
                    self.phase = Phase::LookBack(LookBack::new(self.group));
                    Step::Progress
                }
            }
            Phase::LookBack(mut lookback) => match lookback.poll(cx.store, cx.epoch) {
                LookBackPoll::Advanced => {
                    self.phase = Phase::LookBack(lookback);
                    Step::Progress
                }
                LookBackPoll::Blocked { waiting_on } => {
                    self.phase = Phase::LookBack(lookback);
                    Step::Blocked { waiting_on }
                }
                LookBackPoll::Ready(exclusive) => {
                    cx.store.publish_prefix(self.group, exclusive + self.local);
                    cx.store
                        .set_status(self.group, GroupStatus::PrefixReady, cx.epoch);
                    self.resolved(cx, exclusive)
                }
            },
            Phase::Finalize { exclusive } => {
                let total = exclusive + self.local;
                let (finalization, round) =
                    finalize(total, cx.cluster, cx.centroids, cx.convergence, cx.params);
                self.outcome = Some(FinalOutcome {
                    total,
                    finalization,
                    round,
                });
                Step::Finished
            }
            Phase::Done => Step::Finished,
        }
    }

    /// Masked accumulation for every lane followed by the group-local scan.
    fn reduce(&self, cx: &DispatchContext<'_>) -> Vec4 {
        let lanes = cx.params.workgroup_size;
        let first_worker = self.group * lanes;
        let mut shared: Vec<Vec4> = (first_worker..first_worker + lanes)
            .map(|worker| {
                masked_accumulate(
                    cx.pixels,
                    cx.assignment,
                    cx.cluster,
                    worker,
                    cx.params.sequencing_factor,
                )
            })
            .collect();
        inclusive_scan(&mut shared);
        shared.last().copied().unwrap_or_default()
    }

    /// The exclusive prefix is known; only the last group has work left.
    fn resolved(&mut self, cx: &DispatchContext<'_>, exclusive: Vec4) -> Step {
        if cx.is_last_group(self.group) {
            self.phase = Phase::Finalize { exclusive };
            Step::Progress
        } else {
            Step::Finished
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::WORKGROUP_SIZE;

    struct Fixture {
        pixels: PixelGrid,
        assignment: Vec<u32>,
        centroids: CentroidTable,
        convergence: ConvergenceVector,
        store: GroupStore,
        params: RunParams,
    }

    impl Fixture {
        fn new(pixel_count: u32, groups: u32) -> Self {
            Self {
                pixels: PixelGrid::solid(pixel_count, 1, Vec4::new(0.5, 0.25, 1.0, 1.0)),
                assignment: vec![0; pixel_count as usize],
                centroids: CentroidTable::new(&[Vec4::ZERO]),
                convergence: ConvergenceVector::new(1),
                store: GroupStore::new(groups),
                params: RunParams {
                    sequencing_factor: 1,
                    workgroup_size: WORKGROUP_SIZE,
                    ..RunParams::default()
                },
            }
        }

        fn cx(&self, groups: u32) -> DispatchContext<'_> {
            DispatchContext {
                pixels: &self.pixels,
                assignment: &self.assignment,
                centroids: &self.centroids,
                convergence: &self.convergence,
                store: &self.store,
                params: &self.params,
                cluster: 0,
                epoch: 1,
                groups,
            }
        }
    }

    #[test]
    fn single_group_finalizes_without_look_back() {
        let fixture = Fixture::new(16, 1);
        let cx = fixture.cx(1);
        let mut task = GroupTask::new(0);
        assert_eq!(task.step(&cx), Step::Progress); // entry
        assert_eq!(task.step(&cx), Step::Progress); // reduce + publish
        assert_eq!(task.step(&cx), Step::Finished); // finalize
        assert!(task.is_done());

        let outcome = task.outcome().unwrap();
        assert_eq!(outcome.total, Vec4::new(8.0, 4.0, 16.0, 16.0));
        // moved from black, so not converged
        assert_eq!(outcome.round, Some(0));
        assert_eq!(fixture.centroids.get(0), Vec4::new(0.5, 0.25, 1.0, 1.0));
    }

    #[test]
    fn second_group_blocks_until_first_publishes() {
        let fixture = Fixture::new(512, 2);
        let cx = fixture.cx(2);
        let mut first = GroupTask::new(0);
        let mut last = GroupTask::new(1);

        assert_eq!(last.step(&cx), Step::Progress);
        assert_eq!(last.step(&cx), Step::Progress);
        assert_eq!(last.step(&cx), Step::Blocked { waiting_on: 0 });

        assert_eq!(first.step(&cx), Step::Progress);
        assert_eq!(first.step(&cx), Step::Finished);
        assert!(first.outcome().is_none());

        assert_eq!(last.step(&cx), Step::Progress);
        assert_eq!(last.step(&cx), Step::Finished);
        assert_eq!(last.outcome().unwrap().total.w, 512.0);
    }

    #[test]
    fn completed_round_exits_on_entry() {
        let fixture = Fixture::new(16, 1);
        fixture.convergence.record(0, true);
        fixture.convergence.close_round();
        let cx = fixture.cx(1);

        let mut task = GroupTask::new(0);
        assert_eq!(task.step(&cx), Step::Exited);
        assert!(task.exited());
        assert_eq!(fixture.store.status(0, 1), GroupStatus::NotReady);
        assert_eq!(fixture.centroids.get(0), Vec4::ZERO);
    }
}
