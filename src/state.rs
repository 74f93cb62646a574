use std::sync::Arc;

use crate::{
    room::{handler::{ROOM_CTL_CHANNEL, ROOM_PING_CHANNEL}, RoomHandler, Rooms},
    ws::Mux,
};

/* ------------ shared across connections ------------ */
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<Rooms>,
    pub mux:   Arc<Mux>,
}

impl AppState {
    /// Room registry plus a mux with the room channels wired in.
    pub fn new(rooms: Arc<Rooms>) -> Self {
        let room_handler = Arc::new(RoomHandler::new(rooms.clone()));
        let mut mux = Mux::default();
        mux.handle(ROOM_PING_CHANNEL, room_handler.clone())
            .handle(ROOM_CTL_CHANNEL, room_handler);
        Self { rooms, mux: Arc::new(mux) }
    }
}
