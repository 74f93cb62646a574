use axum::extract::ws::close_code;
use std::fmt::Display;

pub type AppResult<T> = Result<T, AppErr>;

/* ── process bootstrap ── */
#[derive(thiserror::Error, Debug)]
pub enum AppErr {
    #[error("Bad config: {0}")]
    Config(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub fn bad_config<E: Display>(e: E) -> AppErr { AppErr::Config(e.to_string()) }

/* ── connection-fatal: becomes the close frame sent to the peer ── */
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("ws close {code}: {reason}")]
pub struct WsErr {
    pub code:   u16,
    pub reason: String,
}

impl WsErr {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self { code, reason: reason.into() }
    }

    /// Malformed envelope or payload, oversized field, invalid value.
    pub fn invalid(reason: impl Into<String>) -> Self { Self::new(close_code::INVALID, reason) }
    pub fn unsupported(reason: impl Into<String>) -> Self { Self::new(close_code::UNSUPPORTED, reason) }
    pub fn policy(reason: impl Into<String>) -> Self { Self::new(close_code::POLICY, reason) }
    pub fn protocol(reason: impl Into<String>) -> Self { Self::new(close_code::PROTOCOL, reason) }
    pub fn internal(reason: impl Into<String>) -> Self { Self::new(close_code::ERROR, reason) }
    pub fn normal() -> Self { Self::new(close_code::NORMAL, "") }
    pub fn going_away() -> Self { Self::new(close_code::AWAY, "Server shutting down") }
}

/* ── recoverable room errors: the connection stays open ── */
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomErr {
    #[error("Invalid room")]
    NotFound,

    #[error("Not member of room")]
    NotMember,
}

/* ── a write to one connection's queue that did not go through ── */
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkErr {
    #[error("ws connection closed")]
    Closed,

    #[error("ws write queue full")]
    Full,
}
