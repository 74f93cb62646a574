use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::{SinkErr, WsErr};

/// Outbound messages one connection may have queued before writes to it
/// start failing.
pub const WRITE_QUEUE: usize = 64;

/// What the connection's write task sends to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close(WsErr),
}

/// Receiving end drained by the connection's write task.
pub type Outbox = mpsc::Receiver<Outbound>;

/// Write half of one connection.
///
/// Cheap to clone; the room engine keeps one per member so broadcasts can
/// reach that connection. Writes never block: they queue for the
/// connection's write task, and fail when that queue is full or the task
/// is gone.
#[derive(Debug, Clone)]
pub struct Writer {
    tx: mpsc::Sender<Outbound>,
}

impl Writer {
    pub fn new() -> (Self, Outbox) {
        Self::with_capacity(WRITE_QUEUE)
    }

    pub fn with_capacity(n: usize) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(n);
        (Self { tx }, rx)
    }

    pub fn write(&self, text: String) -> Result<(), SinkErr> {
        self.send(Outbound::Text(text))
    }

    pub fn close(&self, err: WsErr) -> Result<(), SinkErr> {
        self.send(Outbound::Close(err))
    }

    fn send(&self, out: Outbound) -> Result<(), SinkErr> {
        self.tx.try_send(out).map_err(|e| match e {
            TrySendError::Full(_)   => SinkErr::Full,
            TrySendError::Closed(_) => SinkErr::Closed,
        })
    }
}
