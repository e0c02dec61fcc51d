//! PINGREQ / PINGRESP / DISCONNECT: header-only packets with zero remaining
//! length. No teacher counterpart (the demo client never pinged); follows the
//! same header-only pattern as the other packet modules.

/// Marker type for packets that carry no variable header or payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingReq;
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingResp;
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnect;
