//! Room registry: shared playback state plus who is watching.
//!
//! Every read or write of room data goes through the single registry lock.
//! Operations hand back the payload to send and the writers to send it to;
//! the caller does the writing once the lock is released.

pub mod handler;

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{error::RoomErr, utils::clock, ws::Writer};

pub use handler::RoomHandler;

/// Members and rooms unseen for longer than this are dropped.
pub const EXPIRY_MS: i64 = 7000;

pub const MAX_ROOM_LEN:  usize = 127;
pub const MAX_NAME_LEN:  usize = 127;
pub const MAX_VIDEO_LEN: usize = 8192;
pub const PING_MIN: i64 = -1;
pub const PING_MAX: i64 = 5000;

pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Shared by member and room eviction.
fn expired(at: i64, now: i64) -> bool {
    at + EXPIRY_MS < now
}

/* ------------ wire shapes ------------ */
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PingReq {
    #[serde(default)] pub room:  String,
    #[serde(default)] pub name:  String,
    #[serde(default)] pub ping:  i64,
    #[serde(default)] pub pos:   i64,
    #[serde(default)] pub play:  bool,
    #[serde(default)] pub ready: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CtlReq {
    #[serde(default)] pub room:  String,
    #[serde(default)] pub video: String,
    #[serde(default)] pub pos:   i64,
    #[serde(default)] pub play:  bool,
}

/// A member as the other members see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name:  String,
    pub ping:  i64,
    pub pos:   i64,
    pub play:  bool,
    pub ready: bool,
    /// last seen, unix ms
    pub at:    i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room:    String,
    pub members: HashMap<String, Member>,
    pub video:   String,
    pub pos:     i64,
    pub play:    bool,
    pub ctlat:   i64,
    pub at:      i64,
    /// ms between the request arriving and the room being updated
    pub d:       i64,
    pub ctr:     u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtlRes {
    pub room:  String,
    pub video: String,
    pub pos:   i64,
    pub play:  bool,
    pub ctlat: i64,
    pub at:    i64,
    pub ctr:   u32,
}

/// Result of a room operation: what to send, and to whom.
#[derive(Debug)]
pub struct Delivery<T> {
    pub res:     T,
    pub targets: Vec<Writer>,
}

/* ------------ registry ------------ */
struct MemberState {
    m: Member,
    w: Writer,
}

struct RoomState {
    id:      String,
    members: HashMap<String, MemberState>,
    video:   String,
    pos:     i64,
    play:    bool,
    ctl_at:  i64,
    at:      i64,
    ctr:     u32,
}

impl RoomState {
    fn new(id: &str, at: i64) -> Self {
        Self {
            id: id.to_owned(),
            members: HashMap::new(),
            video: String::new(),
            pos: 0,
            play: false,
            ctl_at: at,
            at,
            ctr: 0,
        }
    }

    fn evict_members(&mut self, now: i64) {
        self.members.retain(|_, v| !expired(v.m.at, now));
    }

    fn member_views(&self) -> HashMap<String, Member> {
        self.members.iter().map(|(k, v)| (k.clone(), v.m.clone())).collect()
    }
}

pub struct Rooms {
    rooms: Mutex<HashMap<String, RoomState>>,
    clock: Clock,
}

impl Default for Rooms {
    fn default() -> Self {
        Self::with_clock(Arc::new(clock::now_ms))
    }
}

impl Rooms {
    pub fn with_clock(clock: Clock) -> Self {
        Self { rooms: Mutex::new(HashMap::new()), clock }
    }

    /// Refreshes `id`'s membership of `room`, creating either if needed.
    ///
    /// `at` is when the request arrived. The snapshot goes back to the
    /// pinging member; `targets` holds every other member.
    pub async fn ping(&self, room: &str, id: &str, req: &PingReq, w: Writer, at: i64) -> Delivery<RoomSnapshot> {
        let mut rooms = self.rooms.lock().await;

        let r = rooms.entry(room.to_owned()).or_insert_with(|| RoomState::new(room, at));
        r.members.insert(id.to_owned(), MemberState {
            m: Member {
                name:  req.name.clone(),
                ping:  req.ping,
                pos:   req.pos,
                play:  req.play,
                ready: req.ready,
                at,
            },
            w,
        });

        let now = (self.clock)();
        r.evict_members(now);
        let targets = r.members.iter()
            .filter(|(k, _)| k.as_str() != id)
            .map(|(_, v)| v.w.clone())
            .collect();

        r.ctr += 1;
        r.at = now.max(r.at);

        Delivery {
            res: RoomSnapshot {
                room:    r.id.clone(),
                members: r.member_views(),
                video:   r.video.clone(),
                pos:     r.pos,
                play:    r.play,
                ctlat:   r.ctl_at,
                at:      r.at,
                d:       r.at - at,
                ctr:     r.ctr,
            },
            targets,
        }
    }

    /// Applies a control update to `room`. Only current members may do so.
    /// `targets` holds every member, the controller included.
    pub async fn control(&self, room: &str, id: &str, req: &CtlReq) -> Result<Delivery<CtlRes>, RoomErr> {
        let mut rooms = self.rooms.lock().await;

        let r = rooms.get_mut(room).ok_or(RoomErr::NotFound)?;
        if !r.members.contains_key(id) {
            return Err(RoomErr::NotMember);
        }

        r.video = req.video.clone();
        r.pos = req.pos;
        r.play = req.play;

        let now = (self.clock)();
        r.evict_members(now);
        let targets = r.members.values().map(|v| v.w.clone()).collect();

        r.ctr += 1;
        r.ctl_at = now.max(r.at);
        r.at = r.ctl_at;

        Ok(Delivery {
            res: CtlRes {
                room:  r.id.clone(),
                video: r.video.clone(),
                pos:   r.pos,
                play:  r.play,
                ctlat: r.ctl_at,
                at:    r.at,
                ctr:   r.ctr,
            },
            targets,
        })
    }

    /// Drops every room with no activity inside the expiry window, members
    /// and all. Returns how many were removed.
    pub async fn gc(&self) -> usize {
        let mut rooms = self.rooms.lock().await;
        let now = (self.clock)();
        let before = rooms.len();
        rooms.retain(|_, r| !expired(r.at, now));
        before - rooms.len()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}
