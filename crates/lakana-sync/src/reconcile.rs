//! Read views: cached rows with pending writes laid on top.
//!
//! The cache may be minutes old and knows nothing about queued writes. These
//! functions merge the two so a command sees its own effects before they are
//! flushed.

use crate::queue::{MembershipOp, Overlay, QueuedUpdate};
use crate::records::{ApplicationRecord, ChannelRecord};

/// Applications as they will look once everything pending is flushed.
///
/// Inserts are appended unless the view already has that generation or
/// another active record for the key. Updates apply to their own generation
/// only and are dropped when that row is already DENIED or REMOVED.
#[must_use]
pub fn applications(base: &[ApplicationRecord], overlay: &Overlay) -> Vec<ApplicationRecord> {
    let mut view = base.to_vec();

    // Updates go first so a queued denial frees the key for a queued
    // re-application, and again afterwards for rows that were just appended.
    apply_updates(&mut view, &overlay.updates);

    let appended = view.len();
    for insert in &overlay.inserts {
        let target = insert.reference();
        let known = view.iter().any(|row| {
            row.is_ref(&target) || (row.is_key(&target.key) && row.status.is_active())
        });
        if !known {
            view.push(insert.clone());
        }
    }

    apply_updates(&mut view[appended..], &overlay.updates);
    view
}

fn apply_updates(rows: &mut [ApplicationRecord], updates: &[QueuedUpdate]) {
    for update in updates {
        let Some(row) = rows.iter_mut().rev().find(|row| row.is_ref(&update.target)) else {
            continue;
        };
        if row.status.is_terminal_negative() {
            continue;
        }
        update.patch.apply(row);
    }
}

/// Channels with queued adds and removes applied in order.
#[must_use]
pub fn channels(base: &[ChannelRecord], overlay: &Overlay) -> Vec<ChannelRecord> {
    let mut view = base.to_vec();
    for &(channel_id, op) in &overlay.memberships {
        match op {
            MembershipOp::Add { added_at } => {
                if !view.iter().any(|c| c.channel_id == channel_id) {
                    view.push(ChannelRecord {
                        channel_id,
                        added_at: Some(added_at),
                    });
                }
            }
            MembershipOp::Remove => view.retain(|c| c.channel_id != channel_id),
        }
    }
    view
}
