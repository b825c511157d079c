//! Channel naming.
//!
//! Rigid bodies have no stable identity in a frame, so each one is published
//! on a channel derived from its position in the frame's body list.  If the
//! capture server reorders bodies between frames, the channel a given
//! physical object lands on changes with it.

/// Prefix shared by every pose channel.
pub const CHANNEL_PREFIX: &str = "MOCAP#";

/// Channel for the rigid body at 0-based `index` within its frame:
/// `0 → "MOCAP#1"`, `1 → "MOCAP#2"`, …  Defined for every `usize`.
pub fn channel_name(index: usize) -> String {
    format!("{CHANNEL_PREFIX}{}", index as u128 + 1)
}
