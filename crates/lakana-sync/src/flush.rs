//! Flush bookkeeping: retry policy and the per-flush report.

use crate::queue::Pending;

/// How often a queued item may fail to flush before it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(30),
        }
    }
}

impl RetryPolicy {
    /// Count one more failure for each item and split them into the ones to
    /// re-queue and the ones that have used up their attempts.
    pub fn settle<T>(&self, failed: Vec<Pending<T>>) -> (Vec<Pending<T>>, Vec<T>) {
        let mut retry = Vec::with_capacity(failed.len());
        let mut abandoned = Vec::new();
        for Pending { item, attempts } in failed {
            let attempts = attempts + 1;
            if self.max_attempts.is_some_and(|max| attempts >= max) {
                abandoned.push(item);
            } else {
                retry.push(Pending { item, attempts });
            }
        }
        (retry, abandoned)
    }
}

/// Outcome of one flush, per step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Application rows appended.
    pub inserted: usize,
    /// Queued inserts dropped because the sheet already had them.
    pub duplicates: usize,
    /// Application rows whose cells were updated.
    pub updated: usize,
    /// Updates dropped because their row was gone or finished.
    pub discarded: usize,
    /// Updates and re-applications held back for a later flush.
    pub deferred: usize,
    pub channels_added: usize,
    pub channels_removed: usize,
    /// Items put back on their queue after a failed write.
    pub requeued: usize,
    /// Items dropped after too many failed writes.
    pub abandoned: usize,
}

impl FlushReport {
    /// Nothing was written, dropped or retried.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }

    /// Every queued item was settled without a transport failure.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.requeued == 0 && self.abandoned == 0
    }
}

impl core::fmt::Display for FlushReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} inserted, {} updated, +{}/-{} channels",
            self.inserted, self.updated, self.channels_added, self.channels_removed
        )?;
        if self.duplicates + self.discarded > 0 {
            write!(f, ", {} skipped", self.duplicates + self.discarded)?;
        }
        if self.deferred > 0 {
            write!(f, ", {} deferred", self.deferred)?;
        }
        if self.requeued > 0 {
            write!(f, ", {} requeued", self.requeued)?;
        }
        if self.abandoned > 0 {
            write!(f, ", {} abandoned", self.abandoned)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_counts_and_abandons() {
        let policy = RetryPolicy {
            max_attempts: Some(2),
        };
        let (retry, abandoned) = policy.settle(vec![
            Pending { item: 'a', attempts: 0 },
            Pending { item: 'b', attempts: 1 },
        ]);
        assert_eq!(retry, vec![Pending { item: 'a', attempts: 1 }]);
        assert_eq!(abandoned, vec!['b']);
    }

    #[test]
    fn test_unlimited_policy_never_abandons() {
        let policy = RetryPolicy { max_attempts: None };
        let (retry, abandoned) = policy.settle(vec![Pending {
            item: (),
            attempts: u32::MAX - 1,
        }]);
        assert_eq!(retry.len(), 1);
        assert!(abandoned.is_empty());
    }

    #[test]
    fn test_report_display() {
        let report = FlushReport {
            inserted: 2,
            updated: 1,
            channels_added: 1,
            requeued: 3,
            ..FlushReport::default()
        };
        assert_eq!(report.to_string(), "2 inserted, 1 updated, +1/-0 channels, 3 requeued");
        assert!(!report.is_clean());
        assert!(FlushReport::default().is_noop());
    }
}
