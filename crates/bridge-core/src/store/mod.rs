//! Store backends implementing [`IdentityStore`](crate::identity::IdentityStore)
//! and [`PendingVoicemailStore`](crate::pending::PendingVoicemailStore).

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
