//! # Call Test Utilities
//!
//! Shared test utilities for the call session controller.
//!
//! ## Modules
//!
//! - `mock_engine` - Recording engine with event injection and failure injection
//! - `fixtures` - Channel, token and pre-positioned sessions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use call_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     // Session already in a call, engine calls recorded by the probe
//!     let session = TestSession::in_call().await;
//!
//!     // Inject an engine event, then read state ordered after it
//!     session.probe.remote_video_starting(42);
//!     let snapshot = session.state().await;
//!
//!     assert_eq!(session.probe.count(EngineOp::SetupRemoteVideo), 1);
//! }
//! ```
//!
//! ## Test Patterns
//!
//! Events injected through [`EngineProbe`] land in the session's event
//! queue. Any request made through the handle afterwards (`get_state()`, a
//! command) is handled after the event.

pub mod fixtures;
pub mod mock_engine;

pub use fixtures::*;
pub use mock_engine::{EngineCall, EngineOp, EngineProbe, MockEngine};
