//! Discrete-event scheduler over virtual time.
//!
//! Devices ask to be woken at an instant by registering a [`SyncPoint`].
//! The scheduler hands due points back one at a time, earliest first, and
//! never stores callbacks: the caller maps each point's [`DeviceId`] to the
//! device. This keeps the pending queue plain data, so it can be captured in
//! a snapshot and re-registered verbatim on load.
//!
//! Points that share an instant are delivered in registration order. A
//! point is removed from the queue before it is delivered, so a device may
//! register follow-up points from inside its callback.

use std::collections::BTreeMap;

use tracing::trace;

use crate::device::{DeviceId, SyncTag};
use crate::time::EmuTime;

/// A pending wake-up request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncPoint {
    pub time: EmuTime,
    pub device: DeviceId,
    pub tag: SyncTag,
}

/// Ordered set of synchronization points.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    /// Keyed by instant, then by registration sequence for a stable tie-break.
    queue: BTreeMap<(EmuTime, u64), (DeviceId, SyncTag)>,
    next_seq: u64,
    current: EmuTime,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Time up to which points have been dispatched.
    #[must_use]
    pub fn current_time(&self) -> EmuTime {
        self.current
    }

    /// Number of pending points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Register a wake-up for `device` at `time`.
    ///
    /// `time` may already have passed; such a point is delivered on the
    /// next [`Self::dispatch_due`].
    pub fn register_point(&mut self, time: EmuTime, device: DeviceId, tag: SyncTag) {
        let seq = self.next_seq;
        self.next_seq += 1;
        trace!(%time, ?device, ?tag, seq, "register sync point");
        self.queue.insert((time, seq), (device, tag));
    }

    /// Remove the points of `device`; all of them, or only those carrying
    /// `tag`. Returns how many were removed.
    pub fn cancel_points(&mut self, device: DeviceId, tag: Option<SyncTag>) -> usize {
        let before = self.queue.len();
        self.queue
            .retain(|_, (d, t)| !(*d == device && tag.is_none_or(|tag| *t == tag)));
        let removed = before - self.queue.len();
        if removed > 0 {
            trace!(?device, ?tag, removed, "cancel sync points");
        }
        removed
    }

    /// True if `device` has a pending point (with `tag`, if given).
    #[must_use]
    pub fn has_point(&self, device: DeviceId, tag: Option<SyncTag>) -> bool {
        self.queue
            .values()
            .any(|(d, t)| *d == device && tag.is_none_or(|tag| *t == tag))
    }

    /// Number of pending points owned by `device`.
    #[must_use]
    pub fn pending_for(&self, device: DeviceId) -> usize {
        self.queue.values().filter(|(d, _)| *d == device).count()
    }

    /// Earliest pending instant, or [`EmuTime::INFINITY`] when idle.
    #[must_use]
    pub fn next_instant(&self) -> EmuTime {
        self.queue
            .first_key_value()
            .map_or(EmuTime::INFINITY, |(&(time, _), _)| time)
    }

    /// Remove and return the earliest point if it is due at `now`.
    pub fn pop_due(&mut self, now: EmuTime) -> Option<SyncPoint> {
        let entry = self.queue.first_entry()?;
        if entry.key().0 > now {
            return None;
        }
        let ((time, _), (device, tag)) = entry.remove_entry();
        Some(SyncPoint { time, device, tag })
    }

    /// Deliver every point due at `now`, earliest first.
    ///
    /// The earliest pending point is looked up again after every delivery,
    /// so points registered by `deliver` that are already due are handled in
    /// this same call, in order. Returns the number of points delivered.
    pub fn dispatch_due<F>(&mut self, now: EmuTime, mut deliver: F) -> usize
    where
        F: FnMut(&mut Self, SyncPoint),
    {
        debug_assert!(
            now >= self.current,
            "virtual time ran backwards: {now} < {}",
            self.current
        );
        let mut delivered = 0;
        while let Some(point) = self.pop_due(now) {
            self.current = self.current.max(point.time);
            trace!(time = %point.time, device = ?point.device, tag = ?point.tag, "dispatch");
            deliver(self, point);
            delivered += 1;
        }
        self.current = self.current.max(now);
        delivered
    }

    /// Pending points in dispatch order.
    pub fn points(&self) -> impl Iterator<Item = SyncPoint> + '_ {
        self.queue
            .iter()
            .map(|(&(time, _), &(device, tag))| SyncPoint { time, device, tag })
    }

    /// Drop every pending point.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Replace the whole state: current time plus points given in dispatch
    /// order. Registration order of equal instants is preserved.
    pub fn restore<I>(&mut self, current: EmuTime, points: I)
    where
        I: IntoIterator<Item = SyncPoint>,
    {
        self.queue.clear();
        self.current = current;
        for point in points {
            self.register_point(point.time, point.device, point.tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const A: DeviceId = DeviceId::new(0);
    const B: DeviceId = DeviceId::new(1);
    const C: DeviceId = DeviceId::new(2);

    fn t(ticks: u64) -> EmuTime {
        EmuTime::from_ticks(ticks)
    }

    fn drain(sched: &mut Scheduler, now: EmuTime) -> Vec<SyncPoint> {
        let mut seen = Vec::new();
        sched.dispatch_due(now, |_, point| seen.push(point));
        seen
    }

    #[test]
    fn idle_scheduler_reports_infinity() {
        let sched = Scheduler::new();
        assert!(sched.next_instant().is_infinite());
        assert!(sched.is_empty());
    }

    #[test]
    fn ties_resolve_in_registration_order() {
        let base = 1_000;
        let mut sched = Scheduler::new();
        sched.register_point(t(base + 10), A, SyncTag::DEFAULT);
        sched.register_point(t(base + 10), B, SyncTag::DEFAULT);
        sched.register_point(t(base + 5), C, SyncTag::DEFAULT);

        let order: Vec<_> = drain(&mut sched, t(base + 10))
            .iter()
            .map(|p| p.device)
            .collect();
        assert_eq!(order, vec![C, A, B]);
        assert_eq!(sched.current_time(), t(base + 10));
    }

    #[test]
    fn only_due_points_are_delivered() {
        let mut sched = Scheduler::new();
        sched.register_point(t(50), A, SyncTag::DEFAULT);
        sched.register_point(t(150), B, SyncTag::DEFAULT);

        assert_eq!(drain(&mut sched, t(100)).len(), 1);
        assert_eq!(sched.next_instant(), t(150));
        assert_eq!(sched.current_time(), t(100));
    }

    #[test]
    fn past_points_fire_on_next_pump() {
        let mut sched = Scheduler::new();
        sched.dispatch_due(t(500), |_, _| {});
        sched.register_point(t(10), A, SyncTag::DEFAULT);
        let seen = drain(&mut sched, t(500));
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].time, t(10));
    }

    #[test]
    fn cancel_by_tag_keeps_other_tags() {
        let motor = SyncTag(1);
        let loading = SyncTag(2);
        let mut sched = Scheduler::new();
        sched.register_point(t(10), A, motor);
        sched.register_point(t(20), A, loading);
        sched.register_point(t(30), B, motor);

        assert_eq!(sched.cancel_points(A, Some(motor)), 1);
        assert!(!sched.has_point(A, Some(motor)));
        assert!(sched.has_point(A, Some(loading)));
        assert!(sched.has_point(B, Some(motor)));

        assert_eq!(sched.cancel_points(A, None), 1);
        assert_eq!(sched.pending_for(A), 0);
        assert_eq!(sched.len(), 1);
    }

    #[test]
    fn urgent_point_registered_in_callback_runs_before_later_ones() {
        let mut sched = Scheduler::new();
        sched.register_point(t(10), A, SyncTag::DEFAULT);
        sched.register_point(t(30), B, SyncTag::DEFAULT);

        let mut order = Vec::new();
        sched.dispatch_due(t(40), |sched, point| {
            order.push((point.device, point.time));
            if point.device == A {
                sched.register_point(t(20), C, SyncTag::DEFAULT);
            }
        });
        assert_eq!(order, vec![(A, t(10)), (C, t(20)), (B, t(30))]);
    }

    #[test]
    fn point_is_removed_before_delivery() {
        let mut sched = Scheduler::new();
        sched.register_point(t(10), A, SyncTag::DEFAULT);
        sched.dispatch_due(t(10), |sched, point| {
            assert!(!sched.has_point(point.device, None));
        });
    }

    #[test]
    fn restore_preserves_tie_order() {
        let mut sched = Scheduler::new();
        sched.register_point(t(10), B, SyncTag::DEFAULT);
        sched.register_point(t(10), A, SyncTag::DEFAULT);
        let saved: Vec<_> = sched.points().collect();

        let mut fresh = Scheduler::new();
        fresh.register_point(t(1), C, SyncTag::DEFAULT);
        fresh.restore(t(5), saved.clone());
        assert_eq!(fresh.current_time(), t(5));
        assert_eq!(fresh.points().collect::<Vec<_>>(), saved);
    }

    proptest! {
        #[test]
        fn dispatch_order_is_sorted_and_stable(times in proptest::collection::vec(0u64..64, 1..40)) {
            let mut sched = Scheduler::new();
            for (i, &time) in times.iter().enumerate() {
                sched.register_point(t(time), DeviceId::new(i as u32), SyncTag::DEFAULT);
            }
            let seen = drain(&mut sched, t(64));
            prop_assert_eq!(seen.len(), times.len());
            for pair in seen.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                prop_assert!(a.time < b.time || (a.time == b.time && a.device.index() < b.device.index()));
            }
        }
    }
}
