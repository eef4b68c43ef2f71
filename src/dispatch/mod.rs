//! Sequential hand-off of one message per recipient to an external
//! messaging app.
//!
//! The [`sequencer`] owns the ordered list and the position in it, the
//! [`handoff`] adapters turn one item into a platform URI and open it, and
//! the [`watcher`] notices when the user comes back from the other app.

pub mod handoff;
pub mod phone;
pub mod sequencer;
pub mod watcher;

pub use handoff::{Environment, Handoff, LaunchError, Launcher, WindowStatus};
pub use sequencer::{Advance, DispatchError, DispatchItem, DispatchSequence, Platform, Recipient};
pub use watcher::{ArmToken, HostEvent, ReturnSignal, ReturnWatcher};
