//! Decode one frame from hex.

use anyhow::{Context, Result};
use sync_types::Frame;

/// Parse a hex dump into a frame.
///
/// Whitespace, `:` and `-` separators are ignored, as is a leading `0x`.
pub fn parse(input: &str) -> Result<Frame> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect();
    let bytes = hex::decode(&digits).context("Input is not valid hex")?;
    Frame::from_bytes(&bytes).context("Not a valid sync frame")
}

/// Run the decode command.
pub fn run(input: &str) -> Result<()> {
    let frame = parse(input)?;
    let msg_type = frame.message_type();

    println!("seq:  {}", frame.seq);
    println!("type: {:?} ({:#04x})", msg_type, msg_type as u8);
    println!("{}", serde_json::to_string_pretty(&frame.message)?);

    Ok(())
}
