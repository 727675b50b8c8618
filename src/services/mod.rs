//! Services module - the background machinery behind the store facade.
//!
//! These components own all disk traffic and have no dependency on the store
//! contract itself; they communicate through
//! [`SharedState`](crate::store::shared::SharedState) and the broadcast event
//! channel.
//!
//! # Components
//!
//! - [`WriteSerializer`](serializer::WriteSerializer): explicit FIFO write
//!   queue drained by a single worker loop. Guarantees at most one in-flight
//!   disk write and suppresses writes issued before the first successful
//!   reload.
//!
//! - [`ReloadEngine`](reload::ReloadEngine): reads the bound files, rebuilds
//!   the plugin map, and retries transient failures on a fixed budget
//!   (`Idle` / `Reloading` / `Exhausted` state machine).
//!
//! - [`ChangeWatcher`](watcher::ChangeWatcher): filesystem notifications for
//!   the bound directory, filtered to the managed file names, debounced, and
//!   suppressed while our own writes are pending.
//!
//! # Design Philosophy
//!
//! - **Async**: all disk I/O and timers go through tokio
//! - **Generation-checked**: every continuation re-validates the binding it
//!   was issued against before touching shared state or disk
//! - **Non-propagating**: write failures and retry exhaustion are logged and
//!   surfaced as typed events, never panics or queue aborts

pub mod reload;
pub mod serializer;
pub mod watcher;

pub use reload::ReloadState;
pub use watcher::WatchError;
