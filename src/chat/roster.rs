//! Roster control frames.
//!
//! The roster travels on the same text stream as chat: any line starting
//! with the reserved `#USERS ` prefix carries the full comma-separated
//! participant list, and a client keys on that prefix alone to tell it
//! apart from display text.

/// Reserved prefix marking a roster frame.
pub const ROSTER_PREFIX: &str = "#USERS ";

/// Render a roster frame from an already-sorted nickname list.
///
/// An empty list renders as the bare prefix with an empty remainder.
pub fn roster_frame(nicknames: &[String]) -> String {
    format!("{}{}", ROSTER_PREFIX, nicknames.join(","))
}
