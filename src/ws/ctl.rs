//! The `_ctl_` channel: transport-level latency measurement.
//!
//! `{ops: [{op, args}]}` is processed all-or-nothing. A single `ping`
//! anywhere in the batch yields exactly one reply carrying the time the
//! message started processing and how long processing took.

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{envelope::{self, ClientReqMsg}, Writer, CTL_CHANNEL};
use crate::error::WsErr;

const OP_PING: &str = "ping";

/// `args` is accepted on the wire but no op reads it yet.
#[derive(Debug, Deserialize)]
struct CtlOp {
    op: String,
}

#[derive(Debug, Default, Deserialize)]
struct CtlOps {
    #[serde(default)]
    ops: Vec<CtlOp>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CtlResPing {
    /// wall clock ms when the message started processing
    pub t: i64,
    /// processing duration ms
    pub d: i64,
}

pub fn handle(w: &Writer, m: &ClientReqMsg) -> Result<(), WsErr> {
    let req_time = Utc::now().timestamp_millis();
    let start = Instant::now();

    let ops: Option<CtlOps> = serde_json::from_value(m.v.clone())
        .map_err(|_| WsErr::invalid("Invalid ctl op msg"))?;

    let mut ping_ok = false;
    for i in ops.unwrap_or_default().ops {
        match i.op.as_str() {
            OP_PING => ping_ok = true,
            _ => return Err(WsErr::invalid("Invalid ctl op")),
        }
    }

    if ping_ok {
        let res = CtlResPing {
            t: req_time,
            d: i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX),
        };
        let b = envelope::encode(&m.id, CTL_CHANNEL, &res)
            .map_err(|_| WsErr::internal("Failed to encode ping res"))?;
        w.write(b)
            .map_err(|_| WsErr::protocol("Failed to write to ws connection"))?;
    }
    Ok(())
}
