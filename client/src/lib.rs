//! Observer side of the analysis progress stream.
//!
//! Opens one server-push connection per analysis run, decodes what arrives
//! and folds it into a [`StreamState`] snapshot the caller can read at any
//! time.
//!
//! # Architecture
//!
//! - **Channel Transport** (`transport`): one connection, one handler, wire
//!   order preserved. Reconnection is disabled outright because the run being
//!   observed is not idempotent. A connection that fails or goes idle before
//!   a terminal event yields a single `ConnectionLost` delivery.
//! - **State Accumulator** (`state`): a pure reducer from the previous
//!   snapshot and one delivery to the next snapshot. It ignores input once the
//!   session is no longer active.
//! - **Session Controller** (`controller`): owns at most one channel. `start`
//!   closes the previous channel and installs the new one under a generation
//!   counter, so a late delivery from an old channel is never applied.
//!
//! # Example
//!
//! ```rust,ignore
//! use analysis_client::{EventSourceTransport, SessionController};
//!
//! let mut controller =
//!     SessionController::new(EventSourceTransport::default(), "http://localhost:4000");
//! controller.start("pump-7", None)?;
//! let finished = controller.wait_until_finished().await;
//! println!("{:?}", finished.result);
//! ```

pub mod controller;
pub mod error;
pub mod state;
pub mod transport;

pub use controller::SessionController;
pub use error::Error;
pub use events::{AgentComplete, AgentStatus, LayerComplete};
pub use state::{FailureKind, SessionStatus, StreamState};
pub use transport::{
    ChannelHandle, Delivery, EventSourceTransport, Handler, Transport, TransportConfig,
};
