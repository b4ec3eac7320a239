//! # Call-Audio Relay
//!
//! The fake speech service: a WebSocket endpoint at `/call/{token}` that
//! records every inbound binary frame to a per-token file while replaying a
//! canned audio payload to the caller on a fixed cadence.
//!
//! ## Session shape:
//! 1. **Accept**: the listener upgrades the connection and extracts the token
//! 2. **Race**: an inbound recorder and an outbound streamer run as
//!    independent tasks against the two halves of the connection
//! 3. **Teardown**: whichever task finishes first wins; the other is
//!    cancelled and joined before the connection and the recording are closed
//!
//! The relay never reports failures to the caller. Every outcome is observable
//! only through logs, the metrics endpoints, and the recorded artifact.

pub mod payload;
pub mod server;
pub mod session;
pub mod sink;

pub use payload::PayloadCache;
pub use server::serve;
pub use session::{handle_call, RelayContext, TaskOutcome};
pub use sink::RecordingSink;
