//! Snapshot polling service.
//!
//! The poller owns the schedule (regular interval, exponential backoff after
//! failures), the current bounds query and request supersession. It does not
//! perform I/O: the host asks for a [`FetchRequest`], runs it however it
//! likes, and hands the result back through [`SnapshotPoller::complete`].
//! Time comes from an injected [`Clock`], so backoff is testable without
//! sleeping.

use foundation::time::{Clock, Time};
use scene::records::AircraftRecord;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::error::FetchError;
use crate::protocol::{BoundsQuery, SnapshotPayload};
use crate::request::{RequestId, RequestTracker};
use crate::synthetic::SyntheticFleet;

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_s: f64,
    pub backoff_base_s: f64,
    pub backoff_factor: f64,
    pub backoff_max_s: f64,
    /// Aircraft whose last fix is this much older than the newest are pruned.
    pub stale_after_s: f64,
    pub placeholder_count: usize,
    pub placeholder_seed: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_s: 10.0,
            backoff_base_s: 5.0,
            backoff_factor: 2.0,
            backoff_max_s: 120.0,
            stale_after_s: 300.0,
            placeholder_count: 400,
            placeholder_seed: 0x5EED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchRequest {
    pub id: RequestId,
    pub query: BoundsQuery,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Merge these records into the store.
    Apply {
        records: Vec<AircraftRecord>,
        rejected: usize,
    },
    /// First load failed with an empty store: show stand-in traffic.
    Placeholder(Vec<AircraftRecord>),
    /// Fetch failed; the store is left alone until the retry.
    Failed { retry_in_s: f64 },
    /// Result of a superseded or cancelled request.
    Ignored,
}

#[derive(Debug)]
pub struct SnapshotPoller<C: Clock> {
    clock: C,
    config: PollingConfig,
    backoff: Backoff,
    tracker: RequestTracker,
    query: BoundsQuery,
    next_poll_at: Time,
    loaded_once: bool,
    placeholder_used: bool,
}

impl<C: Clock> SnapshotPoller<C> {
    pub fn new(clock: C, config: PollingConfig) -> Self {
        let now = clock.now();
        Self {
            backoff: Backoff::new(
                config.backoff_base_s,
                config.backoff_factor,
                config.backoff_max_s,
            ),
            clock,
            config,
            tracker: RequestTracker::new(),
            query: BoundsQuery::world(),
            next_poll_at: now,
            loaded_once: false,
            placeholder_used: false,
        }
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    pub fn query(&self) -> BoundsQuery {
        self.query
    }

    pub fn next_poll_at(&self) -> Time {
        self.next_poll_at
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.backoff.failures()
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        self.tracker.in_flight()
    }

    /// A request if one is due and none is in flight.
    pub fn poll(&mut self) -> Option<FetchRequest> {
        if self.tracker.in_flight().is_some() || self.clock.now() < self.next_poll_at {
            return None;
        }
        Some(self.start())
    }

    /// Adopt new bounds. Starts a request right away (superseding one in
    /// flight) unless the bounds are unchanged or the poller is backing off.
    pub fn update_bounds(&mut self, query: BoundsQuery) -> Option<FetchRequest> {
        if query == self.query {
            return None;
        }
        self.query = query;
        if self.backoff.failures() > 0 && self.clock.now() < self.next_poll_at {
            return None;
        }
        Some(self.start())
    }

    fn start(&mut self) -> FetchRequest {
        let (id, superseded) = self.tracker.begin();
        if let Some(old) = superseded {
            debug!("request {} superseded by {}", old.0, id.0);
        }
        FetchRequest {
            id,
            query: self.query,
        }
    }

    /// Report the result of request `id`.
    ///
    /// `store_is_empty` is read by the caller at completion time.
    pub fn complete(
        &mut self,
        id: RequestId,
        result: Result<SnapshotPayload, FetchError>,
        store_is_empty: bool,
    ) -> PollOutcome {
        if !self.tracker.finish(id) {
            debug!("ignoring result of stale request {}", id.0);
            return PollOutcome::Ignored;
        }
        let now = self.clock.now();

        match result {
            Ok(payload) => {
                self.backoff.record_success();
                self.loaded_once = true;
                self.next_poll_at = now.plus(self.config.interval_s);
                let (records, rejected) = payload.into_records();
                PollOutcome::Apply { records, rejected }
            }
            Err(err) => {
                let retry_in_s = self.backoff.record_failure();
                self.next_poll_at = now.plus(retry_in_s);
                warn!(
                    failures = self.backoff.failures(),
                    "snapshot fetch failed: {err}; retrying in {retry_in_s:.1}s"
                );

                if store_is_empty && !self.loaded_once && !self.placeholder_used {
                    self.placeholder_used = true;
                    let fleet =
                        SyntheticFleet::new(self.config.placeholder_count, self.config.placeholder_seed);
                    let (records, _) = fleet.snapshot(0.0, now.0).into_records();
                    info!("first load failed; showing {} placeholder aircraft", records.len());
                    return PollOutcome::Placeholder(records);
                }
                PollOutcome::Failed { retry_in_s }
            }
        }
    }

    /// Drop any in-flight request; its result will be ignored.
    pub fn cancel(&mut self) {
        if let Some(id) = self.tracker.cancel() {
            debug!("cancelled request {}", id.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation::time::ManualClock;
    use std::rc::Rc;

    fn payload() -> SnapshotPayload {
        SyntheticFleet::new(3, 9).snapshot(0.0, 100.0)
    }

    fn poller(clock: &Rc<ManualClock>) -> SnapshotPoller<Rc<ManualClock>> {
        SnapshotPoller::new(
            Rc::clone(clock),
            PollingConfig {
                interval_s: 10.0,
                backoff_base_s: 2.0,
                backoff_factor: 2.0,
                backoff_max_s: 8.0,
                placeholder_count: 5,
                ..PollingConfig::default()
            },
        )
    }

    #[test]
    fn polls_on_interval() {
        let clock = Rc::new(ManualClock::new(Time(0.0)));
        let mut p = poller(&clock);
        let req = p.poll().expect("first poll is immediate");
        assert!(p.poll().is_none(), "one request at a time");

        let outcome = p.complete(req.id, Ok(payload()), true);
        assert!(matches!(outcome, PollOutcome::Apply { ref records, rejected: 0 } if records.len() == 3));

        clock.advance(9.9);
        assert!(p.poll().is_none());
        clock.advance(0.1);
        assert!(p.poll().is_some());
    }

    #[test]
    fn failures_back_off_exponentially() {
        let clock = Rc::new(ManualClock::new(Time(0.0)));
        let mut p = poller(&clock);
        // Seed a successful load so failures never produce placeholders.
        let req = p.poll().expect("poll");
        p.complete(req.id, Ok(payload()), true);

        let mut delays = Vec::new();
        for _ in 0..4 {
            clock.set(p.next_poll_at());
            let req = p.poll().expect("due");
            match p.complete(req.id, Err(FetchError::Status(503)), false) {
                PollOutcome::Failed { retry_in_s } => delays.push(retry_in_s),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(delays, vec![2.0, 4.0, 8.0, 8.0]);

        clock.set(p.next_poll_at());
        let req = p.poll().expect("due");
        p.complete(req.id, Ok(payload()), false);
        assert_eq!(p.consecutive_failures(), 0);
        assert_eq!(p.next_poll_at(), clock.now().plus(10.0));
    }

    #[test]
    fn placeholder_only_on_first_empty_failure() {
        let clock = Rc::new(ManualClock::new(Time(0.0)));
        let mut p = poller(&clock);
        let req = p.poll().expect("poll");
        let outcome = p.complete(req.id, Err(FetchError::Transport("offline".into())), true);
        assert!(matches!(outcome, PollOutcome::Placeholder(ref r) if r.len() == 5));

        clock.set(p.next_poll_at());
        let req = p.poll().expect("retry");
        let outcome = p.complete(req.id, Err(FetchError::Transport("offline".into())), true);
        assert!(matches!(outcome, PollOutcome::Failed { .. }));
    }

    #[test]
    fn no_placeholder_when_store_has_data() {
        let clock = Rc::new(ManualClock::new(Time(0.0)));
        let mut p = poller(&clock);
        let req = p.poll().expect("poll");
        let outcome = p.complete(req.id, Err(FetchError::Status(500)), false);
        assert!(matches!(outcome, PollOutcome::Failed { .. }));
    }

    #[test]
    fn bounds_change_supersedes_in_flight_request() {
        let clock = Rc::new(ManualClock::new(Time(0.0)));
        let mut p = poller(&clock);
        let old = p.poll().expect("poll");

        let narrow = BoundsQuery {
            min_lat: 30.0,
            max_lat: 50.0,
            min_lon: -80.0,
            max_lon: -60.0,
        };
        let new = p.update_bounds(narrow).expect("new request");
        assert_eq!(new.query, narrow);
        assert!(p.update_bounds(narrow).is_none(), "unchanged bounds");

        assert_eq!(p.complete(old.id, Ok(payload()), true), PollOutcome::Ignored);
        assert!(matches!(
            p.complete(new.id, Ok(payload()), true),
            PollOutcome::Apply { .. }
        ));
    }

    #[test]
    fn cancel_ignores_late_result() {
        let clock = Rc::new(ManualClock::new(Time(0.0)));
        let mut p = poller(&clock);
        let req = p.poll().expect("poll");
        p.cancel();
        assert_eq!(p.complete(req.id, Ok(payload()), true), PollOutcome::Ignored);
    }
}
