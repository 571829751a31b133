use std::collections::HashMap;
use std::time::SystemTime;

/// One unit of loop input: a player's payload tagged with the frame and
/// sequence it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub player_id: String,
    pub data: Vec<u8>,
    pub frame_id: u64,
    pub sequence_id: u64,
    pub timestamp: SystemTime,
}

impl Message {
    /// A default-fill placeholder for a player with no pending input at
    /// `frame_id`.
    pub fn empty(player_id: impl Into<String>, frame_id: u64) -> Self {
        Self {
            player_id: player_id.into(),
            data: Vec::new(),
            frame_id,
            sequence_id: 0,
            timestamp: SystemTime::now(),
        }
    }
}

/// The aggregated per-tick snapshot of every registered player's input in
/// frame-sync mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub frame_id: u64,
    pub inputs: HashMap<String, Message>,
}
