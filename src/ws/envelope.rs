use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MAX_CHANNEL_LEN, MAX_ID_LEN};
use crate::error::WsErr;

/* ------------ client → server ------------ */
#[derive(Debug, Clone, Deserialize)]
pub struct ClientReqMsg {
    #[serde(default)] pub id: String,
    #[serde(default)] pub ch: String,
    #[serde(default)] pub v:  Value,
}

/// A decoded frame tagged with the identity of the connection it came in on.
/// `userid` is assigned by the server, never read off the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct ReqMsg {
    pub id:     String,
    pub ch:     String,
    pub userid: String,
    pub v:      Value,
}

impl ClientReqMsg {
    pub fn with_user(self, userid: &str) -> ReqMsg {
        ReqMsg { id: self.id, ch: self.ch, userid: userid.to_owned(), v: self.v }
    }
}

/* ------------ server → client ------------ */
#[derive(Debug, Serialize)]
pub struct ResMsg<'a, T> {
    pub id: &'a str,
    pub ch: &'a str,
    pub v:  &'a T,
}

pub fn decode(text: &str) -> Result<ClientReqMsg, WsErr> {
    let m: ClientReqMsg = serde_json::from_str(text)
        .map_err(|_| WsErr::invalid("Malformed request msg"))?;
    if m.id.len() > MAX_ID_LEN {
        return Err(WsErr::invalid("Invalid msg id"));
    }
    if m.ch.is_empty() || m.ch.len() > MAX_CHANNEL_LEN {
        return Err(WsErr::invalid("Invalid msg channel"));
    }
    Ok(m)
}

/// Wraps `v` in an envelope echoing the request's id and channel.
pub fn encode<T: Serialize>(id: &str, ch: &str, v: &T) -> serde_json::Result<String> {
    serde_json::to_string(&ResMsg { id, ch, v })
}
