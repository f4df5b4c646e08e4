//! Human-readable time formatting
//!
//! Provides the `MM:SS` display used for song lengths, elapsed time and the
//! playlist.

/// Format whole seconds as zero-padded `MM:SS`.
///
/// Minutes are not wrapped into hours; long modules show e.g. `72:05`.
///
/// # Examples
///
/// ```
/// use spindle_common::human_time::format_mm_ss;
///
/// assert_eq!(format_mm_ss(0), "00:00");
/// assert_eq!(format_mm_ss(330), "05:30");
/// assert_eq!(format_mm_ss(4325), "72:05");
/// ```
pub fn format_mm_ss(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Format a length for list display: `MM:SS`, or empty when unknown (zero).
pub fn format_length(seconds: u64) -> String {
    if seconds > 0 {
        format_mm_ss(seconds)
    } else {
        String::new()
    }
}

/// Format a pattern position as `PPP/LLL` (one-based position).
///
/// # Examples
///
/// ```
/// use spindle_common::human_time::format_position;
///
/// assert_eq!(format_position(0, 64), "001/064");
/// ```
pub fn format_position(position: usize, length: usize) -> String {
    format!("{:03}/{:03}", position + 1, length)
}
