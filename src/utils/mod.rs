//! Errors, logging and console formatting helpers

pub mod error;
pub mod logging;

pub use error::{FishError, Result};
pub use logging::{init_logging, LogConfig};

/// Render seconds as `42.0s`, `3m 07s` or `2h 05m`
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{seconds:.1}s");
    }
    let whole = seconds.round() as u64;
    let (h, m, s) = (whole / 3600, (whole % 3600) / 60, whole % 60);
    if h == 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{h}h {m:02}m")
    }
}

/// Horizontal bar of `width` cells, `value / max` of them filled
pub fn format_bar(value: usize, max: usize, width: usize) -> String {
    let filled = if max == 0 {
        0
    } else {
        (value * width + max / 2) / max
    }
    .min(width);
    format!("{}{}", "#".repeat(filled), ".".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42.0), "42.0s");
        assert_eq!(format_duration(187.0), "3m 07s");
        assert_eq!(format_duration(7500.0), "2h 05m");
    }

    #[test]
    fn test_format_bar() {
        assert_eq!(format_bar(5, 10, 10), "#####.....");
        assert_eq!(format_bar(10, 10, 4), "####");
        assert_eq!(format_bar(0, 0, 3), "...");
    }
}
