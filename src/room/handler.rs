use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use super::{CtlReq, PingReq, Rooms, MAX_NAME_LEN, MAX_ROOM_LEN, MAX_VIDEO_LEN, PING_MAX, PING_MIN};
use crate::{
    error::WsErr,
    utils::clock,
    ws::{envelope, Handler, ReqMsg, Writer},
};

pub const ROOM_PING_CHANNEL: &str = "arcade.room.ping";
pub const ROOM_CTL_CHANNEL:  &str = "arcade.room.ctl";

/// Bridges the room channels onto the [`Rooms`] registry.
pub struct RoomHandler {
    rooms: Arc<Rooms>,
}

fn decode<T: DeserializeOwned>(m: &ReqMsg) -> Result<T, WsErr> {
    serde_json::from_value(m.v.clone()).map_err(|_| WsErr::invalid("Invalid req body"))
}

fn check_room(room: &str) -> Result<(), WsErr> {
    if room.is_empty() {
        return Err(WsErr::invalid("Room not provided"));
    }
    if room.len() > MAX_ROOM_LEN {
        return Err(WsErr::invalid("Invalid room"));
    }
    Ok(())
}

impl RoomHandler {
    pub fn new(rooms: Arc<Rooms>) -> Self { Self { rooms } }

    async fn ping(&self, w: &Writer, m: &ReqMsg, start: i64) -> Result<(), WsErr> {
        let mut req: PingReq = decode(m)?;
        check_room(&req.room)?;
        if req.name.len() > MAX_NAME_LEN {
            return Err(WsErr::invalid("Invalid name"));
        }
        if !(PING_MIN..=PING_MAX).contains(&req.ping) {
            req.ping = -1;
        }

        let d = self.rooms.ping(&req.room, &m.userid, &req, w.clone(), start).await;
        let res = envelope::encode(&m.id, &m.ch, &d.res).map_err(|e| {
            error!(error = %e, "Failed to marshal room state");
            WsErr::internal("Failed to marshal room state")
        })?;

        w.write(res.clone())
            .map_err(|_| WsErr::protocol("Failed to write to ws connection"))?;
        for t in &d.targets {
            if let Err(e) = t.write(res.clone()) {
                warn!(room = %req.room, error = %e, "Failed to forward ping to ws connection");
            }
        }
        Ok(())
    }

    async fn ctl(&self, m: &ReqMsg) -> Result<(), WsErr> {
        let req: CtlReq = decode(m)?;
        check_room(&req.room)?;
        if req.video.len() > MAX_VIDEO_LEN {
            return Err(WsErr::invalid("Invalid video"));
        }
        if req.pos < 0 {
            return Err(WsErr::invalid("Invalid pos"));
        }

        let d = match self.rooms.control(&req.room, &m.userid, &req).await {
            Ok(d) => d,
            Err(e) => {
                debug!(room = %req.room, conn = %m.userid, error = %e, "room control rejected");
                return Ok(());
            }
        };
        let res = match envelope::encode(&m.id, &m.ch, &d.res) {
            Ok(b) => b,
            Err(e) => {
                error!(room = %req.room, error = %e, "Failed to marshal room control message");
                return Ok(());
            }
        };
        for t in &d.targets {
            if let Err(e) = t.write(res.clone()) {
                warn!(room = %req.room, error = %e, "Failed to write to ws connection");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for RoomHandler {
    async fn handle(&self, w: &Writer, m: &ReqMsg) -> Result<(), WsErr> {
        let start = clock::now_ms();
        match m.ch.as_str() {
            ROOM_PING_CHANNEL => self.ping(w, m, start).await,
            ROOM_CTL_CHANNEL => self.ctl(m).await,
            _ => Err(WsErr::invalid(format!("Unexpected channel {}", m.ch))),
        }
    }
}
