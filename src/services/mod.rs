/// Optimistic command execution, bulk actions and undo.
pub mod dispatcher;
/// User-facing notification broadcasting.
pub mod notifications;
/// Snapshot storage for undoing bulk actions.
pub mod undo;

pub use self::dispatcher::Dispatcher;
pub use self::notifications::NotificationHub;
pub use self::undo::{UndoBuffer, UndoEntry, UndoSnapshot};
