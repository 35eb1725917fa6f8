// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watermark label — the caller's text followed by a generation timestamp.

use chrono::Local;
use filigran_core::WatermarkSpec;

/// Timestamp used on paged documents.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp used on images.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// `"<text> <now formatted with format>"`, using local time.
pub fn label(spec: &WatermarkSpec, format: &str) -> String {
    format!("{} {}", spec.text.trim(), Local::now().format(format))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_appends_timestamp() {
        let text = label(&WatermarkSpec::new("  CONFIDENTIAL "), DATE_FORMAT);
        let (prefix, date) = text.rsplit_once(' ').unwrap();
        assert_eq!(prefix, "CONFIDENTIAL");
        assert_eq!(date.len(), "2026-01-31".len());
        assert!(chrono::NaiveDate::parse_from_str(date, DATE_FORMAT).is_ok());
    }
}
