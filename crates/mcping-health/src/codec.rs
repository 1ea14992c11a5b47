//! RakNet unconnected ping/pong codec.
//!
//! Bedrock servers answer an "unconnected ping" datagram with an
//! "unconnected pong" without any session setup. Only the pong's message id
//! is inspected; the status string it carries is ignored.
//!
//! Ping layout (33 bytes):
//!
//! ```text
//! 0       1                9                       25               33
//! +-------+----------------+-----------------------+----------------+
//! | 0x01  | time (u64 LE)  | offline magic (16 B)  | nonce (8 B)    |
//! +-------+----------------+-----------------------+----------------+
//! ```

use std::time::Instant;

use bytes::{BufMut, Bytes, BytesMut};

use crate::outcome::{ProbeOutcome, UnhealthyReason};

/// Message id of an unconnected ping.
pub const UNCONNECTED_PING: u8 = 0x01;

/// Message id of an unconnected pong.
pub const UNCONNECTED_PONG: u8 = 0x1C;

/// RakNet offline message magic. Peers drop packets where this differs.
pub const MAGIC: [u8; 16] = [
    0x00, 0xFF, 0xFF, 0x00, 0xFE, 0xFE, 0xFE, 0xFE, 0xFD, 0xFD, 0xFD, 0xFD, 0x12, 0x34, 0x56,
    0x78,
];

/// Total length of an unconnected ping.
pub const PING_LEN: usize = 33;

/// Byte offset of the timestamp field.
pub const TIMESTAMP_OFFSET: usize = 1;

/// Byte offset of the magic field.
pub const MAGIC_OFFSET: usize = 9;

/// Byte offset of the nonce field.
pub const NONCE_OFFSET: usize = 25;

/// Builds unconnected pings timestamped relative to a fixed epoch.
#[derive(Debug, Clone, Copy)]
pub struct PingCodec {
    epoch: Instant,
}

impl PingCodec {
    /// Codec whose timestamps count from now.
    pub fn new() -> Self {
        Self::with_epoch(Instant::now())
    }

    /// Codec whose timestamps count from `epoch` (normally process start).
    pub fn with_epoch(epoch: Instant) -> Self {
        Self { epoch }
    }

    /// Build a fresh ping. Timestamp and nonce differ per call.
    pub fn build_probe(&self) -> Bytes {
        let elapsed_ms = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);

        let mut buf = BytesMut::with_capacity(PING_LEN);
        buf.put_u8(UNCONNECTED_PING);
        buf.put_u64_le(elapsed_ms);
        buf.put_slice(&MAGIC);
        buf.put_u64(rand::random::<u64>());
        buf.freeze()
    }
}

impl Default for PingCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `reply` is an unconnected pong. Never panics, whatever the length.
pub fn is_live_response(reply: &[u8]) -> bool {
    reply.first() == Some(&UNCONNECTED_PONG)
}

/// Classify a received datagram.
pub fn classify_reply(reply: &[u8]) -> ProbeOutcome {
    if is_live_response(reply) {
        return ProbeOutcome::Healthy;
    }
    match reply.first() {
        Some(&id) => ProbeOutcome::Unhealthy(UnhealthyReason::UnexpectedReply(id)),
        None => ProbeOutcome::Unhealthy(UnhealthyReason::EmptyReply),
    }
}
