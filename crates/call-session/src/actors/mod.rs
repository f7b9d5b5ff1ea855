//! Actor implementation of the call session controller.
//!
//! ```text
//! CallSessionHandle (cloneable, any task)
//!   │  commands (bounded mpsc + oneshot reply)
//!   ▼
//! CallSessionActor (one per session) ◄── EngineEventSender (engine threads, unbounded mpsc)
//!   │  queued events are handled before the next command
//!   ├── owns CallState, mute and camera preferences
//!   ├── owns RenderSurfaceRegistry
//!   ├── owns the engine (released exactly once)
//!   └── publishes CallSnapshot (watch) and SessionUpdate (broadcast)
//! ```
//!
//! # Modules
//!
//! - [`session`] - `CallSessionActor` and `CallSessionHandle`
//! - [`messages`] - Mailbox messages, snapshots and update stream types
//! - [`metrics`] - Mailbox depth monitoring

pub mod messages;
pub mod metrics;
pub mod session;

pub use messages::*;
pub use metrics::MailboxMonitor;
pub use session::{CallSessionActor, CallSessionHandle, SessionSettings};
