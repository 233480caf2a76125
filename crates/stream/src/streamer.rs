use std::collections::{BTreeMap, BTreeSet};

use strata_common::contract_violation;

use crate::budget::StreamBudget;
use crate::config::StreamerConfig;
use crate::resource::{
    FailureRecord, LoadState, ResourceClass, ResourceId, ResourceKind, StreamableResource,
};
use crate::transfer::{Completion, TransferQueue};

/// What one `do_streaming` pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReport {
    pub class: ResourceClass,
    pub frame: u64,
    pub loads: usize,
    pub evictions: usize,
    pub bytes_loaded: u64,
    pub bytes_evicted: u64,
    /// Loads or evictions the pass wanted but held back for this frame.
    pub deferred: usize,
    pub newly_oversized: usize,
    pub used_bytes: u64,
    /// Ceiling this streamer worked under: the global budget minus what the
    /// other streamers hold.
    pub limit_bytes: u64,
}

impl StreamReport {
    pub fn empty(class: ResourceClass, frame: u64) -> Self {
        Self {
            class,
            frame,
            loads: 0,
            evictions: 0,
            bytes_loaded: 0,
            bytes_evicted: 0,
            deferred: 0,
            newly_oversized: 0,
            used_bytes: 0,
            limit_bytes: 0,
        }
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_loaded + self.bytes_evicted
    }
}

/// Owns every resource of one class and keeps them within budget.
///
/// Decisions happen on the frame thread in `do_streaming`; the transfer queue
/// only copies bytes. Upload outcomes are applied at the next `start_frame`.
pub struct ResourceStreamer {
    class: ResourceClass,
    config: StreamerConfig,
    resources: BTreeMap<ResourceId, StreamableResource>,
    next_index: u32,
    used_bytes: u64,
    frame: u64,
    transferred_this_frame: u64,
    last_global_total: Option<u64>,
    queue: TransferQueue,
    last_report: StreamReport,
}

impl ResourceStreamer {
    pub fn new(class: ResourceClass, config: StreamerConfig, queue: TransferQueue) -> Self {
        Self {
            class,
            config,
            resources: BTreeMap::new(),
            next_index: 0,
            used_bytes: 0,
            frame: 0,
            transferred_this_frame: 0,
            last_global_total: None,
            queue,
            last_report: StreamReport::empty(class, 0),
        }
    }

    pub fn class(&self) -> ResourceClass {
        self.class
    }

    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Bytes charged for loaded and ready resources.
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Resident (loaded or ready) resources.
    pub fn active_count(&self) -> usize {
        self.resources.values().filter(|r| r.is_resident()).count()
    }

    /// Bytes of resident resources used in the current frame.
    pub fn memory_active(&self) -> u64 {
        self.resources
            .values()
            .filter(|r| r.is_resident() && r.last_frame_used == Some(self.frame))
            .map(|r| r.byte_size)
            .sum()
    }

    pub fn memory_transferred_this_frame(&self) -> u64 {
        self.transferred_this_frame
    }

    pub fn last_report(&self) -> &StreamReport {
        &self.last_report
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, id: ResourceId) -> Option<&StreamableResource> {
        self.resources.get(&id)
    }

    pub fn is_ready(&self, id: ResourceId) -> bool {
        self.resources.get(&id).is_some_and(StreamableResource::is_ready)
    }

    pub fn resources(&self) -> impl Iterator<Item = &StreamableResource> {
        self.resources.values()
    }

    /// Uploads issued but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.queue.in_flight()
    }

    /// Block until every issued upload has completed. Results are still only
    /// applied by the next `start_frame`.
    pub fn wait_for_transfers(&self) {
        self.queue.wait_idle();
    }

    pub fn register(&mut self, label: impl Into<String>, byte_size: u64, kind: ResourceKind) -> ResourceId {
        let id = ResourceId {
            class: self.class,
            index: self.next_index,
        };
        self.next_index += 1;
        let resource = StreamableResource::new(id, label.into(), byte_size, kind);
        tracing::debug!(%id, label = %resource.label, byte_size, ?kind, "resource registered");
        self.resources.insert(id, resource);
        id
    }

    /// Drop a resource, releasing its device memory if resident.
    pub fn unregister(&mut self, id: ResourceId) -> Option<StreamableResource> {
        let Some(resource) = self.resources.remove(&id) else {
            contract_violation(format_args!("resource {id} is not registered"));
            return None;
        };
        if resource.is_resident() {
            self.used_bytes = self.used_bytes.saturating_sub(resource.byte_size);
            self.queue.release(id, resource.byte_size);
        }
        tracing::debug!(%id, "resource unregistered");
        Some(resource)
    }

    /// Begin `frame`: reset frame counters, apply finished uploads and age
    /// every priority.
    pub fn start_frame(&mut self, frame: u64) {
        self.frame = frame;
        self.transferred_this_frame = 0;
        for completion in self.queue.drain_completions() {
            self.apply_completion(completion);
        }
        for resource in self.resources.values_mut() {
            resource.rescore(frame, &self.config);
        }
    }

    /// Report that `id` is visible this frame at the given LOD coverage.
    pub fn reset_priority(&mut self, id: ResourceId, lod_coverage: f32) {
        match self.resources.get_mut(&id) {
            Some(resource) => resource.touch(self.frame, lod_coverage, &self.config),
            None => contract_violation(format_args!("cannot prioritise {id}: not registered")),
        }
    }

    /// One budgeting pass: plan the resident set, evict what falls outside
    /// it in ascending priority, then load what is missing in descending
    /// priority. Both steps are bounded by the frame cap in `budget`.
    pub fn do_streaming(&mut self, budget: &mut StreamBudget) -> StreamReport {
        let _span = tracing::info_span!("stream_pass", class = %self.class).entered();
        let frame = self.frame;
        let others = budget.global_used.saturating_sub(self.used_bytes);
        let limit = budget.global_total.saturating_sub(others);
        let mut report = StreamReport::empty(self.class, frame);

        if self.last_global_total != Some(budget.global_total) {
            tracing::debug!(
                previous = ?self.last_global_total,
                current = budget.global_total,
                "streaming budget changed"
            );
            self.last_global_total = Some(budget.global_total);
        }
        report.newly_oversized = self.flag_oversized(budget.global_total);

        let order = self.priority_order();
        let plan = self.plan_resident(&order, limit, budget.global_total);

        for &id in order.iter().rev() {
            let Some(resource) = self.resources.get_mut(&id) else {
                continue;
            };
            if !resource.is_resident() || resource.kind == ResourceKind::Constant || plan.contains(&id) {
                continue;
            }
            if !budget.try_charge(resource.byte_size) {
                report.deferred += 1;
                continue;
            }
            resource.state = LoadState::Unloaded;
            resource.generation += 1;
            self.used_bytes = self.used_bytes.saturating_sub(resource.byte_size);
            self.queue.release(id, resource.byte_size);
            report.evictions += 1;
            report.bytes_evicted += resource.byte_size;
            tracing::debug!(%id, bytes = resource.byte_size, priority = resource.priority, "evicted");
        }

        for &id in &order {
            if !plan.contains(&id) {
                continue;
            }
            let Some(resource) = self.resources.get_mut(&id) else {
                continue;
            };
            if resource.is_resident() {
                continue;
            }
            if !budget.allow_loads
                || self.used_bytes + resource.byte_size > limit
                || !budget.try_charge(resource.byte_size)
            {
                report.deferred += 1;
                continue;
            }
            resource.state = LoadState::Loaded;
            resource.generation += 1;
            self.used_bytes += resource.byte_size;
            self.queue.upload(id, resource.generation, resource.byte_size);
            report.loads += 1;
            report.bytes_loaded += resource.byte_size;
            tracing::debug!(%id, bytes = resource.byte_size, priority = resource.priority, "load issued");
        }

        budget.global_used = others + self.used_bytes;
        self.transferred_this_frame += report.bytes_transferred();
        report.used_bytes = self.used_bytes;
        report.limit_bytes = limit;
        tracing::debug!(
            loads = report.loads,
            evictions = report.evictions,
            deferred = report.deferred,
            used = self.used_bytes,
            limit,
            "stream pass complete"
        );
        self.last_report = report.clone();
        report
    }

    fn apply_completion(&mut self, completion: Completion) {
        let id = completion.id;
        let Some(resource) = self.resources.get_mut(&id) else {
            tracing::debug!(%id, "completion for unregistered resource discarded");
            return;
        };
        if resource.generation != completion.generation || resource.state != LoadState::Loaded {
            tracing::debug!(%id, generation = completion.generation, "stale completion discarded");
            return;
        }

        match completion.result {
            Ok(()) => {
                resource.state = LoadState::Ready;
                resource.failure = None;
                tracing::debug!(%id, "resource ready");
            }
            Err(err) => {
                resource.state = LoadState::Unloaded;
                self.used_bytes = self.used_bytes.saturating_sub(resource.byte_size);
                let attempts = resource.failure.map_or(1, |f| f.attempts + 1);
                let backoff = backoff_frames(&self.config, attempts);
                resource.failure = Some(FailureRecord {
                    attempts,
                    retry_frame: self.frame + backoff,
                    global_total: self.last_global_total.unwrap_or_default(),
                });
                tracing::warn!(%id, %err, attempts, backoff, "transfer failed, resource unloaded");
            }
        }
    }

    /// Flag resources larger than the whole budget. Returns how many were
    /// newly flagged; each is reported once per budget value.
    fn flag_oversized(&mut self, global_total: u64) -> usize {
        let mut newly = 0;
        for resource in self.resources.values_mut() {
            if resource.byte_size <= global_total {
                resource.oversized_for = None;
                continue;
            }
            if resource.oversized_for != Some(global_total) {
                resource.oversized_for = Some(global_total);
                newly += 1;
                tracing::warn!(
                    id = %resource.id,
                    label = %resource.label,
                    bytes = resource.byte_size,
                    budget = global_total,
                    "resource larger than the whole streaming budget, skipping"
                );
            }
        }
        newly
    }

    /// Ids by descending priority; equal priorities keep registration order.
    fn priority_order(&self) -> Vec<ResourceId> {
        let mut scored: Vec<(ResourceId, f32)> =
            self.resources.values().map(|r| (r.id, r.priority)).collect();
        scored.sort_by(|(ia, pa), (ib, pb)| pb.total_cmp(pa).then(ia.cmp(ib)));
        scored.into_iter().map(|(id, _)| id).collect()
    }

    /// The set that should be resident after this pass: resident constants,
    /// then missing constants that fit, then every other eligible resource in
    /// priority order that still fits.
    fn plan_resident(&self, order: &[ResourceId], limit: u64, global_total: u64) -> BTreeSet<ResourceId> {
        let mut plan = BTreeSet::new();
        let mut planned = 0u64;
        let ordered: Vec<&StreamableResource> =
            order.iter().filter_map(|id| self.resources.get(id)).collect();

        for resource in ordered.iter().copied() {
            if resource.kind == ResourceKind::Constant && resource.is_resident() {
                plan.insert(resource.id);
                planned += resource.byte_size;
            }
        }

        let constants_first = ordered
            .iter()
            .filter(|r| r.kind == ResourceKind::Constant)
            .chain(ordered.iter().filter(|r| r.kind != ResourceKind::Constant))
            .copied();
        for resource in constants_first {
            if plan.contains(&resource.id) || !self.is_candidate(resource, global_total) {
                continue;
            }
            if planned + resource.byte_size <= limit {
                plan.insert(resource.id);
                planned += resource.byte_size;
            }
        }
        plan
    }

    fn is_candidate(&self, resource: &StreamableResource, global_total: u64) -> bool {
        if resource.is_oversized() {
            return false;
        }
        let wanted = resource.is_wanted(self.frame, &self.config);
        match (resource.kind, resource.is_resident()) {
            (ResourceKind::Constant, _) => resource.retry_allowed(self.frame, global_total),
            (ResourceKind::Streaming, true) => true,
            (ResourceKind::Temporary, true) => wanted,
            (_, false) => wanted && resource.retry_allowed(self.frame, global_total),
        }
    }
}

fn backoff_frames(config: &StreamerConfig, attempts: u32) -> u64 {
    let doublings = attempts.saturating_sub(1).min(32);
    config
        .retry_backoff_frames
        .saturating_mul(1u64 << doublings)
        .min(config.max_backoff_frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::SimulatedDevice;
    use std::sync::Arc;

    const BIG_CAP: u64 = 1 << 40;

    fn streamer() -> (Arc<SimulatedDevice>, ResourceStreamer) {
        let device = Arc::new(SimulatedDevice::new());
        let queue = TransferQueue::inline(device.clone());
        let streamer = ResourceStreamer::new(ResourceClass::Texture, StreamerConfig::default(), queue);
        (device, streamer)
    }

    /// Run one frame: start, report coverage for `visible`, stream.
    fn run_frame(
        s: &mut ResourceStreamer,
        frame: u64,
        visible: &[(ResourceId, f32)],
        total: u64,
        cap: u64,
    ) -> StreamReport {
        s.start_frame(frame);
        for &(id, coverage) in visible {
            s.reset_priority(id, coverage);
        }
        s.do_streaming(&mut StreamBudget::new(total, cap))
    }

    #[test]
    fn higher_priority_wins_the_budget() {
        let (_, mut s) = streamer();
        let a = s.register("a", 100, ResourceKind::Streaming);
        let b = s.register("b", 100, ResourceKind::Streaming);

        run_frame(&mut s, 0, &[(a, 0.2), (b, 0.9)], 150, BIG_CAP);
        assert_eq!(s.get(b).unwrap().state(), LoadState::Loaded);
        assert_eq!(s.get(a).unwrap().state(), LoadState::Unloaded);
        assert_eq!(s.used_bytes(), 100);

        s.start_frame(1);
        assert!(s.is_ready(b));
        assert!(!s.is_ready(a));
    }

    #[test]
    fn frame_cap_defers_until_next_frame() {
        let (_, mut s) = streamer();
        let a = s.register("a", 60, ResourceKind::Streaming);
        let b = s.register("b", 60, ResourceKind::Streaming);
        let visible = [(a, 0.9), (b, 0.1)];

        let report = run_frame(&mut s, 0, &visible, 1000, 100);
        assert_eq!(report.loads, 1);
        assert_eq!(report.deferred, 1);
        assert!(s.get(a).unwrap().is_resident());
        assert!(!s.get(b).unwrap().is_resident());

        run_frame(&mut s, 1, &visible, 1000, 100);
        assert!(s.get(b).unwrap().is_resident());
    }

    #[test]
    fn partly_spent_cap_blocks_a_load() {
        let (_, mut s) = streamer();
        let a = s.register("a", 60, ResourceKind::Streaming);
        s.start_frame(0);
        s.reset_priority(a, 1.0);

        let mut budget = StreamBudget::new(1000, 100);
        budget.frame_remaining = 50;
        s.do_streaming(&mut budget);
        assert!(!s.get(a).unwrap().is_resident());

        s.start_frame(1);
        s.reset_priority(a, 1.0);
        s.do_streaming(&mut StreamBudget::new(1000, 100));
        assert!(s.get(a).unwrap().is_resident());
    }

    #[test]
    fn transfer_larger_than_cap_goes_first_in_a_frame() {
        let (_, mut s) = streamer();
        let big = s.register("big", 300, ResourceKind::Streaming);
        let small = s.register("small", 10, ResourceKind::Streaming);
        let visible = [(big, 1.0), (small, 0.5)];

        let report = run_frame(&mut s, 0, &visible, 1000, 100);
        assert!(s.get(big).unwrap().is_resident());
        assert!(!s.get(small).unwrap().is_resident());
        assert_eq!(report.bytes_loaded, 300);

        run_frame(&mut s, 1, &visible, 1000, 100);
        assert!(s.get(small).unwrap().is_resident());
    }

    #[test]
    fn usage_never_exceeds_budget() {
        let (device, mut s) = streamer();
        let ids: Vec<_> = (0..40)
            .map(|i| s.register(format!("r{i}"), 16 + (i * 37 % 100), ResourceKind::Streaming))
            .collect();
        let total = 600;
        for frame in 0..50u64 {
            let visible: Vec<_> = ids
                .iter()
                .enumerate()
                .filter(|(i, _)| (*i as u64 + frame) % 3 == 0)
                .map(|(i, id)| (*id, (i % 7) as f32 / 7.0))
                .collect();
            run_frame(&mut s, frame, &visible, total, BIG_CAP);
            assert!(s.used_bytes() <= total, "frame {frame}: {}", s.used_bytes());
        }
        s.start_frame(50);
        assert_eq!(device.resident_bytes(), s.used_bytes());
    }

    #[test]
    fn wanted_resource_displaces_stale_resident() {
        let (device, mut s) = streamer();
        let old = s.register("old", 100, ResourceKind::Streaming);
        let new = s.register("new", 100, ResourceKind::Streaming);

        run_frame(&mut s, 0, &[(old, 1.0)], 100, BIG_CAP);
        assert!(s.get(old).unwrap().is_resident());

        let report = run_frame(&mut s, 10, &[(new, 0.5)], 100, BIG_CAP);
        assert_eq!(report.evictions, 1);
        assert_eq!(report.loads, 1);
        assert!(!s.get(old).unwrap().is_resident());
        assert!(s.get(new).unwrap().is_resident());
        assert_eq!(device.release_count(), 1);
    }

    #[test]
    fn idle_streaming_resources_stay_cached() {
        let (_, mut s) = streamer();
        let a = s.register("a", 100, ResourceKind::Streaming);
        run_frame(&mut s, 0, &[(a, 1.0)], 1000, BIG_CAP);
        let report = run_frame(&mut s, 100, &[], 1000, BIG_CAP);
        assert_eq!(report.evictions, 0);
        assert!(s.is_ready(a));
    }

    #[test]
    fn oversized_resource_is_flagged_once() {
        let (_, mut s) = streamer();
        let huge = s.register("huge", 500, ResourceKind::Streaming);

        let first = run_frame(&mut s, 0, &[(huge, 1.0)], 100, BIG_CAP);
        assert_eq!(first.newly_oversized, 1);
        assert!(s.get(huge).unwrap().is_oversized());
        assert!(!s.get(huge).unwrap().is_resident());

        let second = run_frame(&mut s, 1, &[(huge, 1.0)], 100, BIG_CAP);
        assert_eq!(second.newly_oversized, 0);
        assert_eq!(second.deferred, 0);

        run_frame(&mut s, 2, &[(huge, 1.0)], 600, BIG_CAP);
        assert!(!s.get(huge).unwrap().is_oversized());
        assert!(s.get(huge).unwrap().is_resident());
    }

    #[test]
    fn failed_uploads_back_off() {
        let (device, mut s) = streamer();
        let a = s.register("a", 10, ResourceKind::Streaming);
        device.fail_next_uploads(a, 2);

        run_frame(&mut s, 0, &[(a, 1.0)], 100, BIG_CAP);
        assert_eq!(s.get(a).unwrap().state(), LoadState::Loaded);

        // The failure lands at frame 1; first backoff is 4 frames.
        for frame in 1..5 {
            let report = run_frame(&mut s, frame, &[(a, 1.0)], 100, BIG_CAP);
            assert_eq!(report.loads, 0, "retried early at frame {frame}");
        }
        let failure = *s.get(a).unwrap().failure().unwrap();
        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.retry_frame, 5);
        assert_eq!(s.used_bytes(), 0);

        let retry = run_frame(&mut s, 5, &[(a, 1.0)], 100, BIG_CAP);
        assert_eq!(retry.loads, 1);

        // Second failure doubles the wait, but a budget change waives it.
        let report = run_frame(&mut s, 6, &[(a, 1.0)], 100, BIG_CAP);
        assert_eq!(report.loads, 0);
        assert_eq!(s.get(a).unwrap().failure().unwrap().attempts, 2);
        assert_eq!(s.get(a).unwrap().failure().unwrap().retry_frame, 14);

        let report = run_frame(&mut s, 7, &[(a, 1.0)], 200, BIG_CAP);
        assert_eq!(report.loads, 1);
        s.start_frame(8);
        assert!(s.is_ready(a));
        assert!(s.get(a).unwrap().failure().is_none());
    }

    #[test]
    fn backoff_is_capped() {
        let config = StreamerConfig {
            retry_backoff_frames: 4,
            max_backoff_frames: 20,
            ..StreamerConfig::default()
        };
        assert_eq!(backoff_frames(&config, 1), 4);
        assert_eq!(backoff_frames(&config, 2), 8);
        assert_eq!(backoff_frames(&config, 3), 16);
        assert_eq!(backoff_frames(&config, 4), 20);
        assert_eq!(backoff_frames(&config, 90), 20);
    }

    #[test]
    fn stale_completion_is_discarded() {
        let (device, mut s) = streamer();
        let a = s.register("a", 50, ResourceKind::Streaming);
        device.fail_next_uploads(a, 1);

        // Load (fails), evict, reload (succeeds) before any completion is seen.
        run_frame(&mut s, 0, &[(a, 1.0)], 100, BIG_CAP);
        s.do_streaming(&mut StreamBudget::new(10, BIG_CAP));
        assert!(!s.get(a).unwrap().is_resident());
        s.do_streaming(&mut StreamBudget::new(100, BIG_CAP));
        assert_eq!(s.get(a).unwrap().generation(), 3);

        s.start_frame(1);
        assert!(s.is_ready(a));
        assert!(s.get(a).unwrap().failure().is_none());
        assert_eq!(s.used_bytes(), 50);
    }

    #[test]
    fn constants_load_unprompted_and_are_never_evicted() {
        let (_, mut s) = streamer();
        let cube = s.register("unit_cube", 80, ResourceKind::Constant);
        let other = s.register("other", 50, ResourceKind::Streaming);

        run_frame(&mut s, 0, &[(other, 1.0)], 100, BIG_CAP);
        assert!(s.get(cube).unwrap().is_resident());
        assert!(!s.get(other).unwrap().is_resident());

        let report = run_frame(&mut s, 1, &[(other, 1.0)], 50, BIG_CAP);
        assert_eq!(report.evictions, 0);
        assert!(s.is_ready(cube));
    }

    #[test]
    fn temporary_resources_are_reclaimed() {
        let (_, mut s) = streamer();
        let scratch = s.register("scratch", 10, ResourceKind::Temporary);
        let cached = s.register("cached", 10, ResourceKind::Streaming);

        run_frame(&mut s, 0, &[(scratch, 1.0), (cached, 1.0)], 1000, BIG_CAP);
        run_frame(&mut s, 5, &[], 1000, BIG_CAP);
        assert!(s.get(scratch).unwrap().is_resident());

        let report = run_frame(&mut s, 6, &[], 1000, BIG_CAP);
        assert_eq!(report.evictions, 1);
        assert!(!s.get(scratch).unwrap().is_resident());
        assert!(s.get(cached).unwrap().is_resident());
    }

    #[test]
    fn suspended_loads_still_evict() {
        let (_, mut s) = streamer();
        let a = s.register("a", 100, ResourceKind::Streaming);
        let b = s.register("b", 100, ResourceKind::Streaming);
        run_frame(&mut s, 0, &[(a, 1.0)], 100, BIG_CAP);

        s.start_frame(20);
        s.reset_priority(b, 1.0);
        let mut budget = StreamBudget::new(100, BIG_CAP);
        budget.allow_loads = false;
        let report = s.do_streaming(&mut budget);
        assert_eq!(report.evictions, 1);
        assert_eq!(report.loads, 0);
        assert_eq!(s.active_count(), 0);
    }

    #[test]
    fn unregister_releases_device_memory() {
        let (device, mut s) = streamer();
        let a = s.register("a", 40, ResourceKind::Streaming);
        run_frame(&mut s, 0, &[(a, 1.0)], 100, BIG_CAP);
        assert_eq!(device.resident_bytes(), 40);

        let removed = s.unregister(a).unwrap();
        assert_eq!(removed.label(), "a");
        assert_eq!(s.used_bytes(), 0);
        assert_eq!(device.resident_bytes(), 0);
        s.start_frame(1);
        assert!(s.get(a).is_none());
    }

    #[test]
    fn frame_statistics() {
        let (_, mut s) = streamer();
        let a = s.register("a", 30, ResourceKind::Streaming);
        let b = s.register("b", 20, ResourceKind::Streaming);
        run_frame(&mut s, 0, &[(a, 1.0), (b, 1.0)], 100, BIG_CAP);
        assert_eq!(s.memory_transferred_this_frame(), 50);
        assert_eq!(s.active_count(), 2);

        run_frame(&mut s, 1, &[(a, 1.0)], 100, BIG_CAP);
        assert_eq!(s.memory_transferred_this_frame(), 0);
        assert_eq!(s.memory_active(), 30);
        assert_eq!(s.last_report().frame, 1);
    }

    #[test]
    fn worker_transfers_complete_by_next_frame() {
        let device = Arc::new(SimulatedDevice::new());
        let queue = TransferQueue::background(device.clone(), "mesh-transfer");
        let mut s = ResourceStreamer::new(ResourceClass::Mesh, StreamerConfig::default(), queue);
        let ids: Vec<_> = (0..16)
            .map(|i| s.register(format!("m{i}"), 8, ResourceKind::Streaming))
            .collect();
        let visible: Vec<_> = ids.iter().map(|id| (*id, 1.0)).collect();

        run_frame(&mut s, 0, &visible, 1000, BIG_CAP);
        s.wait_for_transfers();
        assert_eq!(s.in_flight(), 0);
        s.start_frame(1);
        assert!(ids.iter().all(|id| s.is_ready(*id)));
        assert_eq!(device.upload_count(), 16);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "not registered")]
    fn double_unregister_panics_in_debug() {
        let (_, mut s) = streamer();
        let a = s.register("a", 1, ResourceKind::Streaming);
        s.unregister(a);
        s.unregister(a);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "not registered")]
    fn prioritising_unknown_resource_panics_in_debug() {
        let (_, mut s) = streamer();
        s.reset_priority(
            ResourceId {
                class: ResourceClass::Texture,
                index: 99,
            },
            1.0,
        );
    }
}
