//! Parallel-prepare / ordered-commit pipeline.
//!
//! Units of work carry a pure, parallelizable *prepare* phase and a *commit*
//! phase that applies the result to shared state. Prepare phases run on a
//! fixed pool of worker threads in any order; commit phases are serialized by
//! a sequence-number barrier so they apply in exactly the submission order.
//!
//! Admission is throttled by an outstanding weighted-cost budget rather than
//! a unit count: a submitter blocks once the declared cost of in-flight units
//! exceeds the budget, bounding peak memory even when unit sizes vary wildly.
//! There is no cancellation; a started build runs to completion, and the
//! first prepare or commit failure is reported by [`CommitPipeline::finish`].

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use gapcode_common::{Result, error::Error};

use crate::simple_mpmc;

/// A unit of work with a parallel prepare phase and an ordered commit phase.
pub trait CommitJob: Send + 'static {
    /// Per-worker scratch state, created once per pool thread and reused
    /// across every prepare that thread runs.
    type Context: Default + Send;

    /// Shared state mutated only by commit phases.
    type Sink: Send + 'static;

    /// Pure per-unit work; runs concurrently with other prepares and must
    /// not touch shared state.
    fn prepare(&mut self, ctx: &mut Self::Context) -> Result<()>;

    /// Applies the prepared result; called in submission order, one commit
    /// at a time.
    fn commit(self, sink: &mut Self::Sink) -> Result<()>;
}

/// Drives [`CommitJob`]s across a fixed worker pool.
pub struct CommitPipeline<J: CommitJob> {
    shared: Arc<Shared<J::Sink>>,
    sender: Option<simple_mpmc::Sender<Unit<J>>>,
    workers: Vec<JoinHandle<()>>,
    next_seq: u64,
}

struct Unit<J> {
    seq: u64,
    cost: u64,
    job: J,
}

struct Shared<S> {
    state: Mutex<PipelineState<S>>,
    commit_turn: Condvar,
    budget_freed: Condvar,
    cost_budget: u64,
}

struct PipelineState<S> {
    sink: Option<S>,
    next_commit: u64,
    cost_in_flight: u64,
    error: Option<Error>,
}

impl<J: CommitJob> CommitPipeline<J> {
    /// Starts `num_workers` pool threads committing into `sink`, with at most
    /// `cost_budget` worth of admitted-but-uncommitted work at any time.
    pub fn new(sink: J::Sink, num_workers: usize, cost_budget: u64) -> CommitPipeline<J> {
        assert!(num_workers != 0, "pipeline requires at least one worker");
        assert!(cost_budget != 0, "pipeline requires a nonzero cost budget");
        let shared = Arc::new(Shared {
            state: Mutex::new(PipelineState {
                sink: Some(sink),
                next_commit: 0,
                cost_in_flight: 0,
                error: None,
            }),
            commit_turn: Condvar::new(),
            budget_freed: Condvar::new(),
            cost_budget,
        });
        let (sender, receiver) = simple_mpmc::channel::<Unit<J>>();
        let workers = (0..num_workers)
            .map(|_| {
                let shared = shared.clone();
                let receiver = receiver.clone();
                std::thread::spawn(move || run_worker(shared, receiver))
            })
            .collect();
        CommitPipeline {
            shared,
            sender: Some(sender),
            workers,
            next_seq: 0,
        }
    }

    /// Admits one unit with the given estimated cost, blocking while the
    /// outstanding-cost budget is exhausted. A unit whose cost alone exceeds
    /// the whole budget is rejected outright.
    pub fn submit(&mut self, job: J, cost: u64) -> Result<()> {
        if cost > self.shared.cost_budget {
            return Err(Error::capacity_exceeded(
                "pipeline submit",
                format!(
                    "unit cost {cost} exceeds the pipeline budget {}",
                    self.shared.cost_budget
                ),
            ));
        }
        {
            let mut state = self.shared.state.lock().unwrap();
            while state.cost_in_flight + cost > self.shared.cost_budget {
                state = self.shared.budget_freed.wait(state).unwrap();
            }
            state.cost_in_flight += cost;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| Error::invalid_operation("submit after finish"))?;
        sender
            .send(Unit { seq, cost, job })
            .map_err(|_| Error::invalid_operation("submit to a stopped pipeline"))
    }

    /// Drains the pipeline: blocks until every admitted unit has prepared and
    /// committed, then returns the sink (or the first recorded failure).
    pub fn finish(mut self) -> Result<J::Sink> {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        let mut state = self.shared.state.lock().unwrap();
        if let Some(error) = state.error.take() {
            return Err(error);
        }
        state
            .sink
            .take()
            .ok_or_else(|| Error::invalid_operation("pipeline already finished"))
    }
}

fn run_worker<J: CommitJob>(shared: Arc<Shared<J::Sink>>, receiver: simple_mpmc::Receiver<Unit<J>>) {
    let mut ctx = J::Context::default();
    while let Ok(mut unit) = receiver.recv() {
        let prepared = unit.job.prepare(&mut ctx);
        let mut state = shared.state.lock().unwrap();
        while state.next_commit != unit.seq {
            state = shared.commit_turn.wait(state).unwrap();
        }
        if state.error.is_none() {
            let outcome = match prepared {
                Ok(()) => match state.sink.as_mut() {
                    Some(sink) => unit.job.commit(sink),
                    None => Err(Error::invalid_operation("commit after finish")),
                },
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                state.error = Some(e);
            }
        }
        state.next_commit += 1;
        state.cost_in_flight -= unit.cost;
        drop(state);
        shared.commit_turn.notify_all();
        shared.budget_freed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct AppendJob {
        id: usize,
        delay_ms: u64,
        payload: Vec<u8>,
    }

    impl CommitJob for AppendJob {
        type Context = ();
        type Sink = Vec<(usize, Vec<u8>)>;

        fn prepare(&mut self, _ctx: &mut ()) -> Result<()> {
            // Later submissions finish preparing earlier.
            std::thread::sleep(Duration::from_millis(self.delay_ms));
            self.payload = vec![self.id as u8; self.id + 1];
            Ok(())
        }

        fn commit(self, sink: &mut Self::Sink) -> Result<()> {
            sink.push((self.id, self.payload));
            Ok(())
        }
    }

    #[test]
    fn test_commits_follow_submission_order() {
        let mut pipeline = CommitPipeline::<AppendJob>::new(Vec::new(), 4, 1 << 20);
        for id in 0..8 {
            let delay_ms = (8 - id) as u64 * 5;
            pipeline
                .submit(
                    AppendJob {
                        id,
                        delay_ms,
                        payload: Vec::new(),
                    },
                    1,
                )
                .unwrap();
        }
        let sink = pipeline.finish().unwrap();
        let ids: Vec<_> = sink.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, (0..8).collect::<Vec<_>>());
        for (id, payload) in sink {
            assert_eq!(payload.len(), id + 1);
        }
    }

    #[test]
    fn test_oversized_unit_is_rejected() {
        let mut pipeline = CommitPipeline::<AppendJob>::new(Vec::new(), 1, 10);
        let err = pipeline
            .submit(
                AppendJob {
                    id: 0,
                    delay_ms: 0,
                    payload: Vec::new(),
                },
                11,
            )
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            gapcode_common::error::ErrorKind::CapacityExceeded { .. }
        ));
        pipeline.finish().unwrap();
    }

    #[test]
    fn test_budget_throttles_but_all_units_complete() {
        let mut pipeline = CommitPipeline::<AppendJob>::new(Vec::new(), 2, 3);
        for id in 0..20 {
            pipeline
                .submit(
                    AppendJob {
                        id,
                        delay_ms: 1,
                        payload: Vec::new(),
                    },
                    2,
                )
                .unwrap();
        }
        let sink = pipeline.finish().unwrap();
        assert_eq!(sink.len(), 20);
    }

    struct FailingJob {
        fail: bool,
    }

    impl CommitJob for FailingJob {
        type Context = ();
        type Sink = usize;

        fn prepare(&mut self, _ctx: &mut ()) -> Result<()> {
            if self.fail {
                Err(Error::invalid_operation("prepare failure"))
            } else {
                Ok(())
            }
        }

        fn commit(self, sink: &mut usize) -> Result<()> {
            *sink += 1;
            Ok(())
        }
    }

    #[test]
    fn test_first_failure_is_reported_at_finish() {
        let mut pipeline = CommitPipeline::<FailingJob>::new(0, 2, 100);
        pipeline.submit(FailingJob { fail: false }, 1).unwrap();
        pipeline.submit(FailingJob { fail: true }, 1).unwrap();
        pipeline.submit(FailingJob { fail: false }, 1).unwrap();
        assert!(pipeline.finish().is_err());
    }
}
