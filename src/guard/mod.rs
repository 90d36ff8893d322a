//! Access control: the pure routing decision and the shells that execute it.

mod decision;
mod edge;
mod navigation;
mod watcher;

pub use decision::{Decision, decide, evaluate};
pub use edge::{AuthContext, EdgeGuard, edge_guard};
pub use navigation::{ClientGuard, NavigationKind, Navigator};
pub use watcher::{ExpiryWatcher, WatchOutcome, check as check_expiry};
