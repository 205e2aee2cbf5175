//! Cached, batched synchronization between the election bot and its sheet.
//!
//! The election sheet lives in a remote spreadsheet with three tables:
//! roles, applications and broadcast channels. Every round trip is slow and
//! rate limited, so this crate keeps reads cached, writes queued, and makes
//! both look consistent to the commands that use them:
//!
//! - **Cached reads**: each table is memoized for a TTL
//! - **Queued writes**: commands enqueue, a periodic flush writes in bulk
//! - **Reconciled views**: reads show queued writes before they are flushed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  SyncEngine                                                         │
//! │    - submit / approve / deny / elect / remove / channels            │
//! │    - lifecycle + exclusivity checks against the reconciled view     │
//! │    - notifications and channel announcements                        │
//! └─────────────────────────────────────────────────────────────────────┘
//!            │ reads                                   │ writes
//!            ▼                                         ▼
//! ┌──────────────────────────────┐     ┌────────────────────────────────┐
//! │  Reconciler                  │◄────│  WriteQueues                   │
//! │    cached rows + overlay     │     │    inserts → updates → channels│
//! └──────────────────────────────┘     └────────────────────────────────┘
//!            │                                         │ flush
//!            ▼                                         ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  CacheLayer → TableStore → RemoteTableClient                        │
//! │    - TTL slot per table, invalidated after every flush              │
//! │    - rows parsed into records once, columns addressed by header     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use lakana_sync::{MemoryTables, RecordingSink, SyncConfig, SyncEngine};
//!
//! let engine = SyncEngine::new(MemoryTables::new(), RecordingSink::new(), SyncConfig::default());
//!
//! // Queued in memory, visible right away
//! engine.submit(request)?;
//! assert_eq!(engine.pending_applications()?.len(), 1);
//!
//! // Written in one bulk call
//! let report = engine.flush();
//! ```

mod cache;
mod config;
mod engine;
mod error;
mod flush;
mod lifecycle;
mod memory;
mod notify;
mod queue;
mod reconcile;
mod records;
mod registry;
mod sheet;
mod store;
mod table;

pub use cache::{CacheLayer, TtlSlot};
pub use config::SyncConfig;
pub use engine::{SubmitRequest, Submission, SyncEngine};
pub use error::{Missing, StoreError, StoreResult, SyncError, SyncResult};
pub use flush::{FlushReport, RetryPolicy};
pub use lifecycle::{Transition, exclusive_conflicts, initial_status};
pub use memory::{MemoryTables, SheetData};
pub use notify::{
    Announcement, Delivery, DeliveryError, LOCAL_LANGUAGE, NoticeParams, NotificationSink,
    RecordingSink, TemplateKey,
};
pub use queue::{MembershipOp, Overlay, QueuedUpdate, WriteQueues};
pub use records::{
    ApplicantId, ApplicantInfo, ApplicationKey, ApplicationPatch, ApplicationRecord,
    ApplicationRef, ApplicationStatus, ChannelId, ChannelRecord, Deadline, RoleId, RoleRecord,
    RoleType, RowError, format_timestamp, parse_timestamp,
};
pub use registry::{Division, RoleRegistry};
pub use sheet::{Candidate, ElectionSheet, SheetDivision, SheetRole};
pub use store::TableStore;
pub use table::{CellEdit, RemoteTableClient, Row, RowIndex, Table, columns};
