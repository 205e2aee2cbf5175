//! In-memory write queues.
//!
//! Commands never talk to the store directly. They push onto one of three
//! queues which the flush job drains in a fixed order:
//!
//! ```text
//!  submit ─────────────► InsertQueue      (new application rows)
//!  approve/deny/... ───► UpdateQueue      (coalesced per application)
//!  start/stop ─────────► MembershipQueue  (add/remove cancel out)
//! ```
//!
//! While a batch is being written it is kept as *in flight* so reads still
//! see it. [`WriteQueues::overlay`] hands the reconciler everything that is
//! not known to be in the cached rows yet.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::records::{ApplicationPatch, ApplicationRecord, ApplicationRef, ChannelId};

/// A queued item and the number of flushes that failed to write it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending<T> {
    pub item: T,
    pub attempts: u32,
}

impl<T> Pending<T> {
    #[must_use]
    pub const fn new(item: T) -> Self {
        Self { item, attempts: 0 }
    }
}

/// New application rows awaiting their first write.
#[derive(Debug, Default)]
pub struct InsertQueue {
    items: Vec<Pending<ApplicationRecord>>,
}

impl InsertQueue {
    pub fn push(&mut self, record: ApplicationRecord) {
        self.items.push(Pending::new(record));
    }

    #[must_use]
    pub fn contains_ref(&self, target: &ApplicationRef) -> bool {
        self.items.iter().any(|p| p.item.is_ref(target))
    }

    pub fn records(&self) -> impl Iterator<Item = &ApplicationRecord> {
        self.items.iter().map(|p| &p.item)
    }

    pub fn drain(&mut self) -> Vec<Pending<ApplicationRecord>> {
        std::mem::take(&mut self.items)
    }

    /// Put failed rows back ahead of anything queued since.
    pub fn requeue(&mut self, failed: Vec<Pending<ApplicationRecord>>) {
        let failed: Vec<_> = failed
            .into_iter()
            .filter(|p| !self.contains_ref(&p.item.reference()))
            .collect();
        self.items.splice(0..0, failed);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Field changes aimed at one generation of an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUpdate {
    pub target: ApplicationRef,
    pub patch: ApplicationPatch,
}

/// Pending field changes, at most one entry per application generation.
#[derive(Debug, Default)]
pub struct UpdateQueue {
    items: Vec<Pending<QueuedUpdate>>,
}

impl UpdateQueue {
    /// Queue a patch, folding it into an existing entry for the same target.
    pub fn push(&mut self, target: ApplicationRef, patch: ApplicationPatch) {
        match self.items.iter_mut().find(|p| p.item.target == target) {
            Some(existing) => existing.item.patch.merge(patch),
            None => self
                .items
                .push(Pending::new(QueuedUpdate { target, patch })),
        }
    }

    #[must_use]
    pub fn get(&self, target: &ApplicationRef) -> Option<&ApplicationPatch> {
        self.items
            .iter()
            .find(|p| &p.item.target == target)
            .map(|p| &p.item.patch)
    }

    pub fn updates(&self) -> impl Iterator<Item = &QueuedUpdate> {
        self.items.iter().map(|p| &p.item)
    }

    pub fn drain(&mut self) -> Vec<Pending<QueuedUpdate>> {
        std::mem::take(&mut self.items)
    }

    /// Put failed updates back. A patch queued in the meantime for the same
    /// target is newer and wins field by field.
    pub fn requeue(&mut self, failed: Vec<Pending<QueuedUpdate>>) {
        for Pending { item, attempts } in failed {
            match self.items.iter_mut().find(|p| p.item.target == item.target) {
                Some(newer) => {
                    let mut patch = item.patch;
                    patch.merge(std::mem::take(&mut newer.item.patch));
                    newer.item.patch = patch;
                    newer.attempts = attempts;
                }
                None => self.items.push(Pending {
                    item,
                    attempts,
                }),
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A pending change to the set of broadcast channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOp {
    Add { added_at: DateTime<Utc> },
    Remove,
}

impl MembershipOp {
    const fn opposes(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Add { .. }, Self::Remove) | (Self::Remove, Self::Add { .. })
        )
    }
}

/// Pending channel adds and removes, at most one per channel.
#[derive(Debug, Default)]
pub struct MembershipQueue {
    ops: BTreeMap<ChannelId, Pending<MembershipOp>>,
}

impl MembershipQueue {
    pub fn add(&mut self, channel: ChannelId, added_at: DateTime<Utc>) {
        self.push(channel, Pending::new(MembershipOp::Add { added_at }));
    }

    pub fn remove(&mut self, channel: ChannelId) {
        self.push(channel, Pending::new(MembershipOp::Remove));
    }

    /// An op opposite to the queued one cancels both; a repeat keeps the
    /// queued one (and its timestamp).
    fn push(&mut self, channel: ChannelId, op: Pending<MembershipOp>) {
        match self.ops.get(&channel) {
            Some(queued) if queued.item.opposes(op.item) => {
                self.ops.remove(&channel);
            }
            Some(_) => {}
            None => {
                self.ops.insert(channel, op);
            }
        }
    }

    #[must_use]
    pub fn get(&self, channel: ChannelId) -> Option<MembershipOp> {
        self.ops.get(&channel).map(|p| p.item)
    }

    pub fn ops(&self) -> impl Iterator<Item = (ChannelId, MembershipOp)> + '_ {
        self.ops.iter().map(|(&channel, p)| (channel, p.item))
    }

    pub fn drain(&mut self) -> Vec<(ChannelId, Pending<MembershipOp>)> {
        std::mem::take(&mut self.ops).into_iter().collect()
    }

    /// Put failed ops back through the same cancellation rules.
    pub fn requeue(&mut self, failed: Vec<(ChannelId, Pending<MembershipOp>)>) {
        for (channel, op) in failed {
            match self.ops.get(&channel) {
                Some(newer) if newer.item.opposes(op.item) => {
                    self.ops.remove(&channel);
                }
                Some(_) => {}
                None => {
                    self.ops.insert(channel, op);
                }
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Everything the reconciler has to lay over the cached rows, oldest first.
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    pub inserts: Vec<ApplicationRecord>,
    pub updates: Vec<QueuedUpdate>,
    pub memberships: Vec<(ChannelId, MembershipOp)>,
}

/// One flush worth of drained items.
#[derive(Debug, Default)]
pub struct Batch {
    pub inserts: Vec<Pending<ApplicationRecord>>,
    pub updates: Vec<Pending<QueuedUpdate>>,
    pub memberships: Vec<(ChannelId, Pending<MembershipOp>)>,
}

/// The three queues plus the batch currently being written.
#[derive(Debug, Default)]
pub struct WriteQueues {
    pub inserts: InsertQueue,
    pub updates: UpdateQueue,
    pub memberships: MembershipQueue,
    in_flight: Overlay,
}

impl WriteQueues {
    /// Drain every queue into a batch, keeping a copy visible as in flight.
    pub fn take_batch(&mut self) -> Batch {
        let batch = Batch {
            inserts: self.inserts.drain(),
            updates: self.updates.drain(),
            memberships: self.memberships.drain(),
        };
        self.in_flight = Overlay {
            inserts: batch.inserts.iter().map(|p| p.item.clone()).collect(),
            updates: batch.updates.iter().map(|p| p.item.clone()).collect(),
            memberships: batch
                .memberships
                .iter()
                .map(|(channel, p)| (*channel, p.item))
                .collect(),
        };
        batch
    }

    /// The batch has been written (or re-queued) and the cache invalidated.
    pub fn land(&mut self) {
        self.in_flight = Overlay::default();
    }

    /// In-flight items first, then queued ones.
    #[must_use]
    pub fn overlay(&self) -> Overlay {
        let mut overlay = self.in_flight.clone();
        overlay.inserts.extend(self.inserts.records().cloned());
        overlay.updates.extend(self.updates.updates().cloned());
        overlay.memberships.extend(self.memberships.ops());
        overlay
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.inserts.is_empty()
            && self.updates.is_empty()
            && self.memberships.is_empty()
            && self.in_flight.inserts.is_empty()
            && self.in_flight.updates.is_empty()
            && self.in_flight.memberships.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::records::{ApplicantId, ApplicantInfo, ApplicationStatus, RoleId};

    fn record(applicant: i64, status: ApplicationStatus) -> ApplicationRecord {
        ApplicationRecord::submitted(
            RoleId::new("r1"),
            ApplicantInfo {
                applicant_id: ApplicantId(applicant),
                name: format!("applicant {applicant}"),
                email: String::new(),
                handle: String::new(),
                language: "fi".into(),
            },
            status,
            Utc::now(),
        )
    }

    #[test]
    fn test_updates_coalesce_per_target() {
        let target = record(1, ApplicationStatus::Pending).reference();
        let mut queue = UpdateQueue::default();
        queue.push(target.clone(), ApplicationPatch::status(ApplicationStatus::Approved));
        queue.push(target.clone(), ApplicationPatch::post_link("https://forum/t/9"));
        queue.push(target.clone(), ApplicationPatch::status(ApplicationStatus::Elected));

        assert_eq!(queue.len(), 1);
        assert_eq!(
            queue.get(&target),
            Some(&ApplicationPatch {
                status: Some(ApplicationStatus::Elected),
                post_link: Some("https://forum/t/9".into()),
            })
        );
    }

    #[test]
    fn test_requeued_update_loses_to_newer_fields() {
        let target = record(1, ApplicationStatus::Pending).reference();
        let mut queue = UpdateQueue::default();
        queue.push(target.clone(), ApplicationPatch::status(ApplicationStatus::Approved));
        queue.push(target.clone(), ApplicationPatch::post_link("old"));
        let failed = queue.drain();

        queue.push(target.clone(), ApplicationPatch::post_link("new"));
        queue.requeue(
            failed
                .into_iter()
                .map(|p| Pending {
                    attempts: p.attempts + 1,
                    ..p
                })
                .collect(),
        );

        let patch = queue.get(&target).unwrap();
        assert_eq!(patch.status, Some(ApplicationStatus::Approved));
        assert_eq!(patch.post_link.as_deref(), Some("new"));
        assert_eq!(queue.drain()[0].attempts, 1);
    }

    #[test]
    fn test_opposite_membership_ops_cancel() {
        let mut queue = MembershipQueue::default();
        queue.add(ChannelId(-1), Utc::now());
        queue.remove(ChannelId(-1));
        assert!(queue.is_empty());

        queue.remove(ChannelId(-2));
        queue.add(ChannelId(-2), Utc::now());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_repeated_add_keeps_first_timestamp() {
        let first = Utc::now();
        let mut queue = MembershipQueue::default();
        queue.add(ChannelId(5), first);
        queue.add(ChannelId(5), first + chrono::Duration::seconds(10));
        assert_eq!(queue.get(ChannelId(5)), Some(MembershipOp::Add { added_at: first }));
    }

    #[test]
    fn test_requeued_membership_cancels_against_newer_op() {
        let mut queue = MembershipQueue::default();
        queue.add(ChannelId(7), Utc::now());
        let failed = queue.drain();
        queue.remove(ChannelId(7));
        queue.requeue(failed);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_in_flight_items_stay_in_overlay() {
        let mut queues = WriteQueues::default();
        let first = record(1, ApplicationStatus::Pending);
        queues.inserts.push(first.clone());
        let batch = queues.take_batch();
        assert_eq!(batch.inserts.len(), 1);

        let second = record(2, ApplicationStatus::Approved);
        queues.inserts.push(second.clone());
        assert_eq!(queues.overlay().inserts, vec![first, second.clone()]);

        queues.land();
        assert_eq!(queues.overlay().inserts, vec![second]);
        assert!(!queues.is_idle());
    }

    #[test]
    fn test_requeued_insert_goes_first_once() {
        let mut queue = InsertQueue::default();
        let first = record(1, ApplicationStatus::Pending);
        queue.push(first.clone());
        let failed = queue.drain();

        queue.push(record(2, ApplicationStatus::Pending));
        queue.requeue(failed.clone());
        queue.requeue(failed);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.records().next(), Some(&first));
        assert!(queue.contains_ref(&first.reference()));
    }
}
