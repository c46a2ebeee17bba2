//! Daily time-block validation and intra-day overlap detection.
//!
//! Everything here is a pure function returning reported values. A failed
//! validation is never fatal — the slot generator reacts by skipping the
//! affected day.

use chrono::NaiveTime;
use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::template::{
    TimeBlock, MAX_BUFFER_MINUTES, MAX_SLOT_DURATION_MINUTES, MIN_SLOT_DURATION_MINUTES,
};

/// Parse a strict `"HH:MM"` local time (hour 00–23, minute 00–59).
pub fn parse_time(value: &str) -> Result<NaiveTime> {
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 5
        && bytes[2] == b':'
        && bytes[0].is_ascii_digit()
        && bytes[1].is_ascii_digit()
        && bytes[3].is_ascii_digit()
        && bytes[4].is_ascii_digit();
    if !well_formed {
        return Err(EngineError::Validation(format!(
            "invalid time '{}': expected HH:MM",
            value
        )));
    }
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
        EngineError::Validation(format!("invalid time '{}': hour 00-23, minute 00-59", value))
    })
}

/// Validate a single block: time format, ordering, duration/buffer bounds.
///
/// Ordering uses lexicographic comparison, which is chronological for the
/// fixed-width `"HH:MM"` format.
pub fn validate_block(block: &TimeBlock) -> Result<()> {
    parse_time(&block.start_time)?;
    parse_time(&block.end_time)?;
    if block.start_time >= block.end_time {
        return Err(EngineError::Validation(format!(
            "block start {} must precede end {}",
            block.start_time, block.end_time
        )));
    }
    if let Some(duration) = block.slot_duration {
        if !(MIN_SLOT_DURATION_MINUTES..=MAX_SLOT_DURATION_MINUTES).contains(&duration) {
            return Err(EngineError::Validation(format!(
                "slot_duration {} out of range {}-{}",
                duration, MIN_SLOT_DURATION_MINUTES, MAX_SLOT_DURATION_MINUTES
            )));
        }
    }
    if let Some(buffer) = block.buffer_minutes {
        if buffer > MAX_BUFFER_MINUTES {
            return Err(EngineError::Validation(format!(
                "buffer_minutes {} exceeds {}",
                buffer, MAX_BUFFER_MINUTES
            )));
        }
    }
    Ok(())
}

/// A detected overlap between two blocks of the same day, named by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockOverlap {
    pub earlier: TimeBlock,
    pub later: TimeBlock,
}

/// Find all overlapping pairs within one day's blocks.
///
/// Blocks are sorted by start time; each adjacent pair where the earlier
/// block's end exceeds the later block's start is a conflict. A block ending
/// exactly when the next starts is NOT a conflict.
pub fn detect_overlap(blocks: &[TimeBlock]) -> Vec<BlockOverlap> {
    let mut sorted: Vec<&TimeBlock> = blocks.iter().collect();
    sorted.sort_by(|a, b| a.start_time.cmp(&b.start_time));

    let mut overlaps = Vec::new();
    for pair in sorted.windows(2) {
        if pair[0].end_time > pair[1].start_time {
            overlaps.push(BlockOverlap {
                earlier: pair[0].clone(),
                later: pair[1].clone(),
            });
        }
    }
    overlaps
}
