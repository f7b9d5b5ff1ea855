//! Call Session Controller Library
//!
//! Drives one two-party video call on top of an external real-time
//! communication engine:
//!
//! - Call lifecycle state machine (`Idle`, `Previewing`, `Joining`, `InCall`, `Ending`)
//! - One render surface per participant, torn down deterministically
//! - Local controls (mute, camera switch, hang up) as optimistic preferences
//! - Observable state stream for a presentation layer
//!
//! # Architecture
//!
//! A single actor owns all session state. Commands from the presentation
//! layer (bounded mailbox) and events from the engine's own threads (their
//! own queue, served first) are handled one at a time:
//!
//! ```text
//! UI ── command ──► CallSessionActor ── request ──► EngineFacade ⇄ network
//!                        ▲    │
//!        engine event ───┘    └──► RenderSurfaceRegistry ──► CallSnapshot ──► UI
//! ```
//!
//! # Modules
//!
//! - [`actors`] - Session actor, handle and message types
//! - [`config`] - Configuration from environment
//! - [`engine`] - Engine boundary (`EngineFacade`) and the loopback engine
//! - [`errors`] - Error types with client error codes
//! - [`observability`] - Metrics
//! - [`registry`] - Render surface registry

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod actors;
pub mod config;
pub mod engine;
pub mod errors;
pub mod observability;
pub mod registry;
