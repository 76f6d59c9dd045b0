//! # Audio Module
//!
//! Per-guild playback sessions and everything they are built from.
//!
//! ## Architecture
//!
//! ### [`session`] - Session Player
//! - One [`session::SessionPlayer`] per guild: queue, current track, loop flag, DJ
//! - Vote-gated control actions (pause/resume/skip/stop/shuffle/clear)
//! - DJ handoff, control message upkeep and idempotent teardown
//!
//! ### [`queue`] - Playback Queue
//! - FIFO shared between command handlers and the advance loop
//! - Suspending `dequeue` with a timeout and a cancellation token
//!
//! ### [`node`] - Audio Node
//! - Capability trait the session drives (connect/play/pause/stop/seek/volume/filter/destroy)
//! - [`songbird_node`] implements it over songbird voice calls
//! - Node events (track end, exception, disconnect) flow back through the [`registry`]
//!
//! ## Concurrency
//!
//! Session state sits behind a `parking_lot::Mutex` that is never held across
//! an `.await`. `advance` and `refresh_control_message` are guarded so a second
//! concurrent caller returns immediately instead of racing the first.

pub mod filters;
pub mod node;
pub mod outcome;
pub mod queue;
pub mod registry;
pub mod session;
pub mod songbird_node;
pub mod track;
pub mod votes;

#[cfg(test)]
pub mod testing;
