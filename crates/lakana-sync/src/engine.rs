//! The synchronization engine.
//!
//! [`SyncEngine`] is the one value the rest of the bot talks to. Commands
//! read through the cache and the reconciler, validate, and push onto the
//! write queues without touching the network for writes. [`SyncEngine::flush`]
//! later writes the queues out in a fixed order.
//!
//! Locking:
//! - `commands` serializes mutating commands so check-then-enqueue is atomic.
//! - `queues` guards the write queues; no remote call is made while it is held.
//! - `flushing` keeps flushes from overlapping.
//! - each cache slot has its own lock (see [`CacheLayer`]).

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::cache::CacheLayer;
use crate::config::SyncConfig;
use crate::error::{Missing, SyncError, SyncResult};
use crate::flush::{FlushReport, RetryPolicy};
use crate::lifecycle::{self, Transition};
use crate::notify::{Announcement, NoticeParams, NotificationSink, TemplateKey};
use crate::queue::{MembershipOp, Overlay, Pending, QueuedUpdate, WriteQueues};
use crate::reconcile;
use crate::records::{
    ApplicantId, ApplicantInfo, ApplicationKey, ApplicationPatch, ApplicationRecord,
    ApplicationStatus, ChannelId, ChannelRecord, RoleId, RoleRecord,
};
use crate::registry::RoleRegistry;
use crate::sheet::ElectionSheet;
use crate::store::TableStore;
use crate::table::{CellEdit, RemoteTableClient, RowIndex, columns};

/// A new application as collected by the dialogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub role_id: RoleId,
    pub applicant: ApplicantInfo,
    /// The applicant has seen the exclusivity warning and wants to go ahead.
    pub acknowledge_conflicts: bool,
}

/// Successful outcome of [`SyncEngine::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Queued for writing; visible to reads immediately.
    Accepted(ApplicationRecord),
    /// The applicant already has active applications to these exclusive
    /// roles. Nothing was queued; resubmit with `acknowledge_conflicts`.
    NeedsConfirmation { conflicts: Vec<RoleRecord> },
}

/// What the insert step of a flush did with its batch.
struct InsertOutcome {
    /// The append call succeeded, or there was nothing to append.
    landed: bool,
    failed: Vec<Pending<ApplicationRecord>>,
    /// Re-applications held back until their predecessor's closing update
    /// is persisted. Requeued without counting an attempt.
    waiting: Vec<Pending<ApplicationRecord>>,
}

/// Cached, batched access to the election sheet.
pub struct SyncEngine<C> {
    store: TableStore<C>,
    cache: CacheLayer,
    queues: Mutex<WriteQueues>,
    commands: Mutex<()>,
    flushing: Mutex<()>,
    sink: Box<dyn NotificationSink>,
    retry: RetryPolicy,
}

impl<C: RemoteTableClient> SyncEngine<C> {
    pub fn new(client: C, sink: impl NotificationSink + 'static, config: SyncConfig) -> Self {
        Self {
            store: TableStore::new(client),
            cache: CacheLayer::new(config.cache_ttl()),
            queues: Mutex::new(WriteQueues::default()),
            commands: Mutex::new(()),
            flushing: Mutex::new(()),
            sink: Box::new(sink),
            retry: config.retry_policy(),
        }
    }

    /// Whether every queue is empty and no flush is writing.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queues.lock().is_idle()
    }

    /// Number of queued `(inserts, updates, channel ops)`.
    #[must_use]
    pub fn queued(&self) -> (usize, usize, usize) {
        let queues = self.queues.lock();
        (
            queues.inserts.len(),
            queues.updates.len(),
            queues.memberships.len(),
        )
    }

    /// Drop every cached table so the next read sees the sheet as it is now,
    /// including edits made by hand.
    pub fn refresh(&self) {
        self.cache.invalidate_all();
        debug!("Caches invalidated");
    }

    /// Queued field changes for one application generation.
    #[must_use]
    pub fn queued_patch(&self, application: &ApplicationRecord) -> Option<ApplicationPatch> {
        self.queues
            .lock()
            .updates
            .get(&application.reference())
            .cloned()
    }

    // ---- reads ----

    /// Roles table. Roles are never written by the engine, so this is the
    /// cached read as is.
    pub fn current_roles(&self) -> SyncResult<Arc<[RoleRecord]>> {
        Ok(self.cache.roles.get_or_fetch(|| self.store.load_roles())?)
    }

    /// Applications including everything not yet flushed.
    pub fn current_applications(&self) -> SyncResult<Vec<ApplicationRecord>> {
        // Snapshot the overlay first: a flush landing in between then shows up
        // twice (and is deduplicated) instead of not at all.
        let overlay = self.queues.lock().overlay();
        let base = self
            .cache
            .applications
            .get_or_fetch(|| self.store.load_applications())?;
        Ok(reconcile::applications(&base, &overlay))
    }

    /// Broadcast channels including queued adds and removes.
    pub fn current_channels(&self) -> SyncResult<Vec<ChannelRecord>> {
        let overlay = self.queues.lock().overlay();
        let base = self
            .cache
            .channels
            .get_or_fetch(|| self.store.load_channels())?;
        Ok(reconcile::channels(&base, &overlay))
    }

    pub fn role(&self, id: &RoleId) -> SyncResult<RoleRecord> {
        let roles = self.current_roles()?;
        RoleRegistry::new(&roles)
            .by_id(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(Missing::Role(id.clone())))
    }

    /// Role by its local or foreign title.
    pub fn role_by_name(&self, name: &str) -> SyncResult<Option<RoleRecord>> {
        let roles = self.current_roles()?;
        Ok(RoleRegistry::new(&roles).by_name(name).cloned())
    }

    /// Roles still accepting applications on `today`.
    pub fn open_roles(&self, today: NaiveDate) -> SyncResult<Vec<RoleRecord>> {
        let roles = self.current_roles()?;
        Ok(RoleRegistry::new(&roles)
            .open_roles(today)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Open roles of one division, by its local name.
    pub fn open_roles_in_division(
        &self,
        division_local: &str,
        today: NaiveDate,
    ) -> SyncResult<Vec<RoleRecord>> {
        let roles = self.current_roles()?;
        Ok(RoleRegistry::new(&roles)
            .open_in_division(division_local, today)
            .into_iter()
            .cloned()
            .collect())
    }

    /// The active application for `key`.
    pub fn application(&self, key: &ApplicationKey) -> SyncResult<ApplicationRecord> {
        self.current_applications()?
            .into_iter()
            .rev()
            .find(|a| a.is_key(key) && a.status.is_active())
            .ok_or_else(|| SyncError::NotFound(Missing::Application(key.clone())))
    }

    /// Active applications to one role.
    pub fn applications_for_role(&self, role_id: &RoleId) -> SyncResult<Vec<ApplicationRecord>> {
        Ok(self
            .current_applications()?
            .into_iter()
            .filter(|a| &a.role_id == role_id && a.status.is_active())
            .collect())
    }

    /// Active applications by one applicant.
    pub fn applications_for_applicant(
        &self,
        applicant: ApplicantId,
    ) -> SyncResult<Vec<ApplicationRecord>> {
        Ok(self
            .current_applications()?
            .into_iter()
            .filter(|a| a.applicant_id == applicant && a.status.is_active())
            .collect())
    }

    /// Applications waiting for an admin decision.
    pub fn pending_applications(&self) -> SyncResult<Vec<ApplicationRecord>> {
        Ok(self
            .current_applications()?
            .into_iter()
            .filter(|a| a.status == ApplicationStatus::Pending)
            .collect())
    }

    /// Active application to `role_id` whose applicant name matches,
    /// ignoring case and surrounding whitespace.
    pub fn find_application_by_name(
        &self,
        role_id: &RoleId,
        name: &str,
    ) -> SyncResult<Option<ApplicationRecord>> {
        let wanted = name.trim().to_lowercase();
        Ok(self
            .applications_for_role(role_id)?
            .into_iter()
            .find(|a| a.name.trim().to_lowercase() == wanted))
    }

    /// Roles grouped by division with their visible candidates.
    pub fn election_sheet(&self) -> SyncResult<ElectionSheet> {
        let roles = self.current_roles()?;
        let applications = self.current_applications()?;
        Ok(ElectionSheet::build(&roles, &applications))
    }

    // ---- commands ----

    /// Queue a new application.
    ///
    /// Fails with [`SyncError::DuplicateApplication`] if the applicant already
    /// has an active application to the role, flushed or not.
    pub fn submit(&self, request: SubmitRequest) -> SyncResult<Submission> {
        let _command = self.commands.lock();

        let roles = self.current_roles()?;
        let role = RoleRegistry::new(&roles)
            .by_id(&request.role_id)
            .ok_or_else(|| SyncError::NotFound(Missing::Role(request.role_id.clone())))?;

        let applications = self.current_applications()?;
        let key = ApplicationKey::new(role.id.clone(), request.applicant.applicant_id);
        if applications
            .iter()
            .any(|a| a.is_key(&key) && a.status.is_active())
        {
            return Err(SyncError::DuplicateApplication(key));
        }

        if !request.acknowledge_conflicts {
            let own = applications
                .iter()
                .filter(|a| a.applicant_id == key.applicant_id);
            let conflicts = lifecycle::exclusive_conflicts(role, own, &roles);
            if !conflicts.is_empty() {
                debug!(
                    "Submission {key} conflicts with {} exclusive roles",
                    conflicts.len()
                );
                return Ok(Submission::NeedsConfirmation {
                    conflicts: conflicts.into_iter().cloned().collect(),
                });
            }
        }

        let record = ApplicationRecord::submitted(
            role.id.clone(),
            request.applicant,
            lifecycle::initial_status(role.role_type),
            Utc::now(),
        );
        self.queues.lock().inserts.push(record.clone());
        info!("Queued application {key} as {}", record.status);
        Ok(Submission::Accepted(record))
    }

    pub fn approve(&self, key: &ApplicationKey) -> SyncResult<ApplicationRecord> {
        self.transition(key, Transition::Approve)
    }

    pub fn deny(&self, key: &ApplicationKey) -> SyncResult<ApplicationRecord> {
        self.transition(key, Transition::Deny)
    }

    pub fn elect(&self, key: &ApplicationKey) -> SyncResult<ApplicationRecord> {
        self.transition(key, Transition::Elect)
    }

    pub fn remove(&self, key: &ApplicationKey) -> SyncResult<ApplicationRecord> {
        self.transition(key, Transition::Remove)
    }

    /// Validate and queue a lifecycle transition, then notify the applicant
    /// and (for approvals and elections to exclusive roles) every channel.
    pub fn transition(
        &self,
        key: &ApplicationKey,
        transition: Transition,
    ) -> SyncResult<ApplicationRecord> {
        let _command = self.commands.lock();

        let role = self.role(&key.role_id)?;
        let applications = self.current_applications()?;
        // Prefer the active generation; fall back to the latest finished one
        // so the caller learns why the transition is refused.
        let current = applications
            .iter()
            .rev()
            .find(|a| a.is_key(key) && a.status.is_active())
            .or_else(|| applications.iter().rev().find(|a| a.is_key(key)))
            .ok_or_else(|| SyncError::NotFound(Missing::Application(key.clone())))?;

        let next = transition.apply(current.status)?;
        self.queues
            .lock()
            .updates
            .push(current.reference(), ApplicationPatch::status(next));

        let mut updated = current.clone();
        updated.status = next;
        info!("{transition} {key}: {} -> {next}", current.status);

        let template = TemplateKey::for_transition(transition);
        if let Err(e) = self.sink.notify(
            updated.applicant_id,
            template,
            &NoticeParams::new(&updated, &role),
        ) {
            warn!("Could not notify applicant {}: {e}", updated.applicant_id);
        }

        if transition.is_announced() && role.role_type.is_exclusive() {
            let announcement = Announcement::new(template, &updated, &role);
            if let Err(e) = self.broadcast(&announcement) {
                warn!("Could not announce {key}: {e}");
            }
        }

        Ok(updated)
    }

    /// Set or clear the external post link of an active application.
    pub fn set_post_link(
        &self,
        key: &ApplicationKey,
        link: Option<String>,
    ) -> SyncResult<ApplicationRecord> {
        let _command = self.commands.lock();

        let mut current = self.application(key)?;
        let patch = ApplicationPatch::post_link(link.unwrap_or_default());
        self.queues
            .lock()
            .updates
            .push(current.reference(), patch.clone());
        patch.apply(&mut current);
        debug!("Queued post link for {key}");
        Ok(current)
    }

    /// Start announcing to `channel`. Registering a known channel is a no-op.
    pub fn register_channel(&self, channel: ChannelId) -> SyncResult<()> {
        let _command = self.commands.lock();

        if self
            .current_channels()?
            .iter()
            .any(|c| c.channel_id == channel)
        {
            debug!("Channel {channel} already registered");
            return Ok(());
        }
        self.queues.lock().memberships.add(channel, Utc::now());
        info!("Queued channel {channel} for registration");
        Ok(())
    }

    /// Stop announcing to `channel`.
    pub fn unregister_channel(&self, channel: ChannelId) -> SyncResult<()> {
        let _command = self.commands.lock();

        if !self
            .current_channels()?
            .iter()
            .any(|c| c.channel_id == channel)
        {
            return Err(SyncError::NotFound(Missing::Channel(channel)));
        }
        self.queues.lock().memberships.remove(channel);
        info!("Queued channel {channel} for removal");
        Ok(())
    }

    /// Deliver `announcement` to every channel and return how many accepted
    /// it. Channels that reject it are queued for removal.
    pub fn broadcast(&self, announcement: &Announcement) -> SyncResult<usize> {
        let channels = self.current_channels()?;
        let mut delivered = 0;
        for channel in channels {
            match self.sink.announce(channel.channel_id, announcement) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Removing channel {}: {e}", channel.channel_id);
                    self.queues.lock().memberships.remove(channel.channel_id);
                }
            }
        }
        Ok(delivered)
    }

    // ---- flush ----

    /// Write every queue to the store: inserts, then updates, then channel
    /// changes, then invalidate the cache.
    ///
    /// Transport failures are not returned. Failed items go back on their
    /// queue (counting one attempt) and the report says how many.
    pub fn flush(&self) -> FlushReport {
        let _flushing = self.flushing.lock();

        let batch = self.queues.lock().take_batch();
        let mut report = FlushReport::default();

        let mut failed_updates = Vec::new();
        let mut deferred_updates = Vec::new();
        let mut failed_memberships = Vec::new();

        let updates: Vec<QueuedUpdate> = batch.updates.iter().map(|p| p.item.clone()).collect();
        let inserts = self.flush_inserts(batch.inserts, &updates, &mut report);
        let failed_inserts = inserts.failed;
        let waiting_inserts = inserts.waiting;

        if inserts.landed {
            (failed_updates, deferred_updates) =
                self.flush_updates(batch.updates, &waiting_inserts, &mut report);
        } else {
            // Updates may target rows that were just refused.
            report.deferred += batch.updates.len();
            deferred_updates = batch.updates;
        }

        failed_memberships.extend(self.flush_memberships(batch.memberships, &mut report));

        self.cache.invalidate_all();

        let (retry_inserts, lost_inserts) = self.retry.settle(failed_inserts);
        let (retry_updates, lost_updates) = self.retry.settle(failed_updates);
        let (retry_memberships, lost_memberships) = self.settle_memberships(failed_memberships);

        report.requeued = retry_inserts.len() + retry_updates.len() + retry_memberships.len();
        report.abandoned = lost_inserts.len() + lost_updates.len() + lost_memberships.len();

        for record in &lost_inserts {
            error!(
                "Abandoning application {} after {} failed flushes",
                record.key(),
                self.retry.max_attempts.unwrap_or_default()
            );
        }
        for update in &lost_updates {
            error!(
                "Abandoning update {:?} to {} after {} failed flushes",
                update.patch,
                update.target.key,
                self.retry.max_attempts.unwrap_or_default()
            );
        }
        for (channel, op) in &lost_memberships {
            error!(
                "Abandoning {op:?} of channel {channel} after {} failed flushes",
                self.retry.max_attempts.unwrap_or_default()
            );
        }

        {
            let mut queues = self.queues.lock();
            queues.inserts.requeue(waiting_inserts);
            queues.inserts.requeue(retry_inserts);
            queues.updates.requeue(deferred_updates);
            queues.updates.requeue(retry_updates);
            queues.memberships.requeue(retry_memberships);
            queues.land();
        }

        if report.is_clean() {
            if !report.is_noop() {
                info!("Flushed: {report}");
            }
        } else {
            warn!("Flush incomplete: {report}");
        }
        report
    }

    fn settle_memberships(
        &self,
        failed: Vec<(ChannelId, Pending<MembershipOp>)>,
    ) -> (
        Vec<(ChannelId, Pending<MembershipOp>)>,
        Vec<(ChannelId, MembershipOp)>,
    ) {
        let (retry, lost) = self.retry.settle(
            failed
                .into_iter()
                .map(|(channel, p)| Pending {
                    item: (channel, p.item),
                    attempts: p.attempts,
                })
                .collect(),
        );
        let retry = retry
            .into_iter()
            .map(|Pending { item: (channel, op), attempts }| {
                (channel, Pending { item: op, attempts })
            })
            .collect();
        (retry, lost)
    }

    /// Append queued applications in one call, skipping any the sheet already
    /// has.
    ///
    /// A re-application whose key is still held by a persisted active row
    /// waits while a denial or removal in `updates` frees it: the new row is
    /// only written once that update has landed.
    fn flush_inserts(
        &self,
        items: Vec<Pending<ApplicationRecord>>,
        updates: &[QueuedUpdate],
        report: &mut FlushReport,
    ) -> InsertOutcome {
        if items.is_empty() {
            return InsertOutcome {
                landed: true,
                failed: Vec::new(),
                waiting: Vec::new(),
            };
        }

        // Fresh read, not the cache: a previous flush may have landed.
        let rows = match self.store.load_applications() {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Could not read applications before insert: {e}");
                return InsertOutcome {
                    landed: false,
                    failed: items,
                    waiting: Vec::new(),
                };
            }
        };
        let after_updates = reconcile::applications(
            &rows,
            &Overlay {
                updates: updates.to_vec(),
                ..Overlay::default()
            },
        );

        let mut fresh: Vec<Pending<ApplicationRecord>> = Vec::with_capacity(items.len());
        let mut waiting = Vec::new();
        for pending in items {
            let target = pending.item.reference();
            let holds_key =
                |row: &ApplicationRecord| row.is_key(&target.key) && row.status.is_active();

            let persisted = rows.iter().any(|row| row.is_ref(&target));
            let queued_twice = fresh
                .iter()
                .any(|p| p.item.is_ref(&target) || holds_key(&p.item));
            if persisted || queued_twice {
                debug!("Skipping already persisted application {}", target.key);
                report.duplicates += 1;
            } else if rows.iter().any(holds_key) {
                if after_updates.iter().any(holds_key) {
                    warn!(
                        "Dropping application {}: an active application already exists",
                        target.key
                    );
                    report.duplicates += 1;
                } else {
                    debug!("Application {} waits for its predecessor to close", target.key);
                    report.deferred += 1;
                    waiting.push(pending);
                }
            } else {
                fresh.push(pending);
            }
        }

        let records: Vec<ApplicationRecord> = fresh.iter().map(|p| p.item.clone()).collect();
        match self.store.append_applications(&records) {
            Ok(()) => {
                report.inserted += records.len();
                InsertOutcome {
                    landed: true,
                    failed: Vec::new(),
                    waiting,
                }
            }
            Err(e) => {
                warn!("Could not append {} applications: {e}", records.len());
                InsertOutcome {
                    landed: false,
                    failed: fresh,
                    waiting,
                }
            }
        }
    }

    /// Write queued field changes in one call.
    ///
    /// Returns `(failed, deferred)`: updates whose write failed, and updates
    /// whose row does not exist yet because its insert is still queued or
    /// waiting.
    fn flush_updates(
        &self,
        items: Vec<Pending<QueuedUpdate>>,
        waiting_inserts: &[Pending<ApplicationRecord>],
        report: &mut FlushReport,
    ) -> (Vec<Pending<QueuedUpdate>>, Vec<Pending<QueuedUpdate>>) {
        if items.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let rows = match self.store.load_applications_indexed() {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Could not read applications before update: {e}");
                return (items, Vec::new());
            }
        };

        let mut edits = Vec::new();
        let mut writing = Vec::new();
        let mut deferred = Vec::new();
        for pending in items {
            let target = &pending.item.target;
            match rows.iter().rev().find(|(_, row)| row.is_ref(target)) {
                None => {
                    if waiting_inserts.iter().any(|p| p.item.is_ref(target))
                        || self.queues.lock().inserts.contains_ref(target)
                    {
                        report.deferred += 1;
                        deferred.push(pending);
                    } else {
                        warn!("Dropping update to {}: row not found", target.key);
                        report.discarded += 1;
                    }
                }
                Some((_, row)) if row.status.is_terminal_negative() => {
                    warn!(
                        "Dropping update to {}: application is {}",
                        target.key, row.status
                    );
                    report.discarded += 1;
                }
                Some((index, _)) => {
                    edits.extend(patch_edits(*index, &pending.item.patch));
                    writing.push(pending);
                }
            }
        }

        match self.store.update_applications(edits) {
            Ok(()) => {
                report.updated += writing.len();
                (Vec::new(), deferred)
            }
            Err(e) => {
                warn!("Could not update {} applications: {e}", writing.len());
                (writing, deferred)
            }
        }
    }

    /// Apply queued channel adds and removes. Returns the ops that failed.
    fn flush_memberships(
        &self,
        items: Vec<(ChannelId, Pending<MembershipOp>)>,
        report: &mut FlushReport,
    ) -> Vec<(ChannelId, Pending<MembershipOp>)> {
        if items.is_empty() {
            return Vec::new();
        }

        let rows = match self.store.load_channels_indexed() {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Could not read channels: {e}");
                return items;
            }
        };

        let mut adds = Vec::new();
        let mut removes = Vec::new();
        for (channel, pending) in items {
            let present = rows.iter().any(|(_, c)| c.channel_id == channel);
            match pending.item {
                MembershipOp::Add { .. } if present => {
                    debug!("Channel {channel} already persisted");
                }
                MembershipOp::Add { .. } => adds.push((channel, pending)),
                MembershipOp::Remove if !present => {
                    debug!("Channel {channel} already gone");
                }
                MembershipOp::Remove => removes.push((channel, pending)),
            }
        }

        let mut failed = Vec::new();

        let records: Vec<ChannelRecord> = adds
            .iter()
            .filter_map(|(channel, pending)| match pending.item {
                MembershipOp::Add { added_at } => Some(ChannelRecord {
                    channel_id: *channel,
                    added_at: Some(added_at),
                }),
                MembershipOp::Remove => None,
            })
            .collect();
        match self.store.append_channels(&records) {
            Ok(()) => report.channels_added += records.len(),
            Err(e) => {
                warn!("Could not add {} channels: {e}", records.len());
                failed.extend(adds);
            }
        }

        // Appends land after the last row, so these indices are still valid.
        let indices: Vec<RowIndex> = rows
            .iter()
            .filter(|(_, c)| removes.iter().any(|(channel, _)| *channel == c.channel_id))
            .map(|(index, _)| *index)
            .collect();
        match self.store.delete_channels(indices) {
            Ok(()) => report.channels_removed += removes.len(),
            Err(e) => {
                warn!("Could not remove {} channels: {e}", removes.len());
                failed.extend(removes);
            }
        }

        failed
    }
}

fn patch_edits(row: RowIndex, patch: &ApplicationPatch) -> Vec<CellEdit> {
    let mut edits = Vec::with_capacity(2);
    if let Some(status) = patch.status {
        edits.push(CellEdit::new(row, columns::STATUS, status.as_str()));
    }
    if let Some(link) = &patch.post_link {
        edits.push(CellEdit::new(row, columns::POST_LINK, link.as_str()));
    }
    edits
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::memory::MemoryTables;
    use crate::notify::RecordingSink;
    use crate::table::{Row, Table};

    fn engine() -> (SyncEngine<Arc<MemoryTables>>, Arc<MemoryTables>) {
        let tables = Arc::new(MemoryTables::new());
        tables.seed(
            Table::Roles,
            vec![Row::from([
                (columns::ROLE_ID, "chair"),
                (columns::DIVISION_LOCAL, "Hallitus"),
                (columns::TITLE_LOCAL, "Puheenjohtaja"),
                (columns::TITLE_FOREIGN, "Chair"),
                (columns::ROLE_TYPE, "EXECUTIVE"),
            ])],
        );
        let engine = SyncEngine::new(
            Arc::clone(&tables),
            RecordingSink::new(),
            SyncConfig::default(),
        );
        (engine, tables)
    }

    fn request(applicant: i64) -> SubmitRequest {
        SubmitRequest {
            role_id: RoleId::new("chair"),
            applicant: ApplicantInfo {
                applicant_id: ApplicantId(applicant),
                name: "Ada Lovelace".into(),
                email: "ada@example.org".into(),
                handle: "ada".into(),
                language: "en".into(),
            },
            acknowledge_conflicts: false,
        }
    }

    #[test]
    fn test_submit_makes_no_write_call() {
        let (engine, tables) = engine();
        engine.current_roles().unwrap();
        engine.current_applications().unwrap();
        let calls = tables.calls();

        engine.submit(request(1)).unwrap();
        assert_eq!(engine.queued(), (1, 0, 0));
        // Served from the cache; the insert only exists in memory.
        assert_eq!(tables.calls(), calls);
        assert!(tables.rows(Table::Applications).is_empty());
    }

    #[test]
    fn test_find_by_name_ignores_case() {
        let (engine, _) = engine();
        engine.submit(request(1)).unwrap();
        let found = engine
            .find_application_by_name(&RoleId::new("chair"), "  ada lovelace ")
            .unwrap()
            .unwrap();
        assert_eq!(found.applicant_id, ApplicantId(1));
        assert!(
            engine
                .find_application_by_name(&RoleId::new("chair"), "Grace")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_post_link_needs_active_application() {
        let (engine, _) = engine();
        let key = ApplicationKey::new(RoleId::new("chair"), ApplicantId(1));
        let err = engine
            .set_post_link(&key, Some("https://forum/t/1".into()))
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(Missing::Application(_))));

        engine.submit(request(1)).unwrap();
        let updated = engine
            .set_post_link(&key, Some("https://forum/t/1".into()))
            .unwrap();
        assert_eq!(updated.post_link, "https://forum/t/1");
        assert_eq!(updated.status, ApplicationStatus::Pending);

        let cleared = engine.set_post_link(&key, None).unwrap();
        assert_eq!(cleared.post_link, "");
        assert_eq!(engine.queued(), (1, 1, 0));
    }

    #[test]
    fn test_flush_writes_both_cells_of_a_patch() {
        let (engine, tables) = engine();
        let key = ApplicationKey::new(RoleId::new("chair"), ApplicantId(1));
        engine.submit(request(1)).unwrap();
        engine.approve(&key).unwrap();
        engine
            .set_post_link(&key, Some("https://forum/t/2".into()))
            .unwrap();

        let report = engine.flush();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.updated, 1);
        let rows = tables.rows(Table::Applications);
        assert_eq!(rows[0].get(columns::STATUS), "APPROVED");
        assert_eq!(rows[0].get(columns::POST_LINK), "https://forum/t/2");
        assert!(engine.is_idle());
    }
}
