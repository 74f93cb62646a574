use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{ctl, envelope, ReqMsg, Writer, CTL_CHANNEL};
use crate::error::WsErr;

/// Wait between two processed frames of one connection.
pub const PACE: Duration = Duration::from_millis(64);

/// One frame read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// An application channel handler.
///
/// An `Err` closes the connection the message came in on, with the error's
/// close code.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, w: &Writer, m: &ReqMsg) -> Result<(), WsErr>;
}

/// Channel router shared by every connection.
#[derive(Default)]
pub struct Mux {
    handlers: HashMap<String, Vec<Arc<dyn Handler>>>,
}

impl Mux {
    /// Registers `h` on `ch`. Several handlers may share a channel; they run
    /// in registration order.
    pub fn handle(&mut self, ch: impl Into<String>, h: Arc<dyn Handler>) -> &mut Self {
        self.handlers.entry(ch.into()).or_default().push(h);
        self
    }

    /// Read loop of one open connection.
    ///
    /// Returns `Ok` when the peer ends the stream or `cancel` fires, `Err`
    /// with the close to send otherwise.
    pub async fn serve<S>(
        &self,
        connid: &str,
        frames: S,
        w: &Writer,
        cancel: &CancellationToken,
    ) -> Result<(), WsErr>
    where
        S: Stream<Item = Result<Frame, WsErr>>,
    {
        let mut frames = std::pin::pin!(frames);
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                f = frames.next() => f,
            };
            let Some(frame) = next else { return Ok(()) };
            let text = match frame? {
                Frame::Text(t) => t,
                Frame::Binary(_) => return Err(WsErr::unsupported("Invalid msg type binary")),
            };

            let m = envelope::decode(&text)?;
            if m.ch == CTL_CHANNEL {
                ctl::handle(w, &m)?;
            } else {
                let msg = m.with_user(connid);
                match self.handlers.get(&msg.ch) {
                    Some(hs) => {
                        for h in hs {
                            h.handle(w, &msg).await?;
                        }
                    }
                    None => trace!(ch = %msg.ch, "no handler for channel"),
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(PACE) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::Outbound;
    use futures_util::stream;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Records every message it sees, tagged with its own name.
    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<(&'static str, ReqMsg)>>>,
        fail: bool,
    }

    #[async_trait]
    impl Handler for Recorder {
        async fn handle(&self, _w: &Writer, m: &ReqMsg) -> Result<(), WsErr> {
            self.seen.lock().unwrap().push((self.name, m.clone()));
            if self.fail {
                return Err(WsErr::invalid("nope"));
            }
            Ok(())
        }
    }

    type Seen = Arc<Mutex<Vec<(&'static str, ReqMsg)>>>;

    fn mux_with(fail_second: bool) -> (Mux, Seen) {
        let seen: Seen = Arc::default();
        let mut mux = Mux::default();
        mux.handle("a", Arc::new(Recorder { name: "first", seen: seen.clone(), fail: false }))
            .handle("a", Arc::new(Recorder { name: "second", seen: seen.clone(), fail: fail_second }))
            .handle("b", Arc::new(Recorder { name: "only-b", seen: seen.clone(), fail: false }));
        (mux, seen)
    }

    fn text(v: Value) -> Result<Frame, WsErr> {
        Ok(Frame::Text(v.to_string()))
    }

    async fn run(mux: &Mux, frames: Vec<Result<Frame, WsErr>>) -> (Result<(), WsErr>, Vec<Outbound>) {
        let (w, mut rx) = Writer::new();
        let res = mux.serve("conn-a", stream::iter(frames), &w, &CancellationToken::new()).await;
        let mut out = Vec::new();
        while let Ok(o) = rx.try_recv() {
            out.push(o);
        }
        (res, out)
    }

    #[tokio::test(start_paused = true)]
    async fn dispatches_in_registration_order_with_identity() {
        let (mux, seen) = mux_with(false);
        let (res, out) = run(&mux, vec![
            text(json!({"id": "1", "ch": "a", "v": {"x": 1}})),
            text(json!({"id": "2", "ch": "b"})),
            text(json!({"id": "3", "ch": "nobody-listens"})),
        ]).await;
        assert!(res.is_ok());
        assert!(out.is_empty());

        let seen = seen.lock().unwrap();
        let names: Vec<_> = seen.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["first", "second", "only-b"]);
        assert!(seen.iter().all(|(_, m)| m.userid == "conn-a"));
        assert_eq!(seen[0].1.v, json!({"x": 1}));
        assert_eq!(seen[2].1.id, "2");
    }

    #[tokio::test(start_paused = true)]
    async fn ctl_channel_is_not_dispatched() {
        let seen: Seen = Arc::default();
        let mut mux = Mux::default();
        mux.handle(CTL_CHANNEL, Arc::new(Recorder { name: "ctl", seen: seen.clone(), fail: false }));

        let (res, out) = run(&mux, vec![
            text(json!({"id": "p", "ch": "_ctl_", "v": {"ops": [{"op": "ping"}]}})),
        ]).await;
        assert!(res.is_ok());
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(out.len(), 1);
        let Outbound::Text(s) = &out[0] else { panic!("expected text") };
        let env: Value = serde_json::from_str(s).unwrap();
        assert_eq!(env["id"], "p");
        assert!(env["v"]["d"].as_i64().unwrap() >= 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_ctl_op_closes_without_reply() {
        let (mux, _) = mux_with(false);
        let (res, out) = run(&mux, vec![
            text(json!({"ch": "_ctl_", "v": {"ops": [{"op": "unknown"}]}})),
            text(json!({"ch": "_ctl_", "v": {"ops": [{"op": "ping"}]}})),
        ]).await;
        assert_eq!(res.unwrap_err().code, 1007);
        assert!(out.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn binary_frame_is_unsupported() {
        let (mux, seen) = mux_with(false);
        let (res, _) = run(&mux, vec![
            Ok(Frame::Binary(vec![1, 2, 3])),
            text(json!({"ch": "a"})),
        ]).await;
        assert_eq!(res.unwrap_err().code, 1003);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn structural_errors_close() {
        let (mux, _) = mux_with(false);
        let long_id = json!({"id": "x".repeat(128), "ch": "a"}).to_string();
        for bad in ["{", r#"{"ch":""}"#, long_id.as_str()] {
            let (res, _) = run(&mux, vec![Ok(Frame::Text(bad.to_owned()))]).await;
            assert_eq!(res.unwrap_err().code, 1007, "{bad}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn handler_error_stops_the_loop() {
        let (mux, seen) = mux_with(true);
        let (res, _) = run(&mux, vec![
            text(json!({"ch": "a"})),
            text(json!({"ch": "b"})),
        ]).await;
        assert_eq!(res.unwrap_err(), WsErr::invalid("nope"));
        let names: Vec<_> = seen.lock().unwrap().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn read_error_is_returned() {
        let (mux, _) = mux_with(false);
        let (res, _) = run(&mux, vec![Err(WsErr::protocol("read"))]).await;
        assert_eq!(res.unwrap_err().code, 1002);
    }

    #[tokio::test(start_paused = true)]
    async fn paces_every_frame() {
        let (mux, _) = mux_with(false);
        let start = Instant::now();
        let (res, _) = run(&mux, vec![
            text(json!({"ch": "b"})),
            text(json!({"ch": "b"})),
            text(json!({"ch": "b"})),
        ]).await;
        assert!(res.is_ok());
        assert!(start.elapsed() >= PACE * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_pending_read_and_pacing() {
        let (mux, seen) = mux_with(false);
        let mux = Arc::new(mux);
        let cancel = CancellationToken::new();
        let (w, _rx) = Writer::new();

        let frames = stream::iter(vec![text(json!({"ch": "b"}))]).chain(stream::pending());
        let task = {
            let (mux, cancel) = (mux.clone(), cancel.clone());
            tokio::spawn(async move { mux.serve("conn-a", frames, &w, &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
