//! Multiplexed message transport over one websocket connection.
//!
//! Every frame is a json envelope `{id, ch, v}`. The reserved `_ctl_`
//! channel is answered here; every other channel is routed to the
//! [`Handler`]s registered on the [`Mux`].

pub mod ctl;
pub mod envelope;
pub mod mux;
pub mod writer;

pub use envelope::ReqMsg;
pub use mux::{Frame, Handler, Mux};
pub use writer::{Outbound, Outbox, Writer};

/// Application subprotocol every client must negotiate.
pub const WS_SUBPROTOCOL: &str = "xorkevin.dev-arcade.v1alpha1";

/// Transport-internal channel, never dispatched to handlers.
pub const CTL_CHANNEL: &str = "_ctl_";

pub const MAX_ID_LEN: usize = 127;
pub const MAX_CHANNEL_LEN: usize = 127;
