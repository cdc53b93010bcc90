//! CLI output formatting.
//!
//! Every report leads with the image's identity (name, format, natural
//! size) and puts what happened to it on indented lines below, so the
//! three commands read alike.
//!
//! # Output Format
//!
//! ## Measure
//!
//! ```text
//! dawn.jpg
//!     JPEG 4000x3000, 2.4 MB
//! ```
//!
//! ## Compress
//!
//! ```text
//! dawn.jpg
//!     JPEG 4000x3000, 2.4 MB
//!     Output: dawn.min.jpg 1200x900, 310.5 KB (-87.4%)
//!     Preview: dawn.preview.jpg 256x192
//! ```
//!
//! When the original is kept:
//!
//! ```text
//! icon.png
//!     PNG 16x16, 212 B
//!     Output: icon.min.png 16x16, 212 B (original kept)
//!     Reason: compressed output (260 B) is not smaller than the original (212 B)
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::compress::CompressOutcome;
use crate::types::{ImageRecord, ProcessResult};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count with one decimal above 1 KB.
pub fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Size change as a signed percentage of the original.
pub fn savings_percent(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (compressed as f64 - original as f64) / original as f64 * 100.0
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Header line plus the `FORMAT WxH, size` detail line.
fn identity_lines(record: &ImageRecord) -> Vec<String> {
    vec![
        record.name.clone(),
        format!(
            "{}{} {}, {}",
            indent(1),
            record.format,
            record.natural(),
            format_size(record.content.len())
        ),
    ]
}

pub fn format_measure_output(record: &ImageRecord) -> Vec<String> {
    identity_lines(record)
}

pub fn print_measure_output(record: &ImageRecord) {
    for line in format_measure_output(record) {
        println!("{}", line);
    }
}

/// Report for one `compress` run; `preview` is the written preview, if any.
pub fn format_compress_output(
    record: &ImageRecord,
    outcome: &CompressOutcome,
    destination: &Path,
    preview: Option<(&Path, &ProcessResult)>,
) -> Vec<String> {
    let mut lines = identity_lines(record);
    let result = &outcome.result;
    let detail = match &outcome.fallback {
        Some(_) => "original kept".to_string(),
        None => format!(
            "{:+.1}%",
            savings_percent(record.content.len(), result.content.len())
        ),
    };
    lines.push(format!(
        "{}Output: {} {}, {} ({})",
        indent(1),
        file_name(destination),
        result.geometry(),
        format_size(result.content.len()),
        detail
    ));
    if let Some(reason) = &outcome.fallback {
        lines.push(format!("{}Reason: {}", indent(1), reason));
    }
    if let Some((path, preview)) = preview {
        lines.push(format!(
            "{}Preview: {} {}",
            indent(1),
            file_name(path),
            preview.geometry()
        ));
    }
    lines
}

pub fn print_compress_output(
    record: &ImageRecord,
    outcome: &CompressOutcome,
    destination: &Path,
    preview: Option<(&Path, &ProcessResult)>,
) {
    for line in format_compress_output(record, outcome, destination, preview) {
        println!("{}", line);
    }
}

pub fn format_preview_output(record: &ImageRecord, destination: &Path, preview: &ProcessResult) -> Vec<String> {
    let mut lines = identity_lines(record);
    lines.push(format!(
        "{}Preview: {} {}, {}",
        indent(1),
        file_name(destination),
        preview.geometry(),
        format_size(preview.content.len())
    ));
    lines
}

pub fn print_preview_output(record: &ImageRecord, destination: &Path, preview: &ProcessResult) {
    for line in format_preview_output(record, destination, preview) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::FallbackReason;
    use crate::imaging::SourceFormat;
    use crate::locator::{DataUriLocators, LocatorService};
    use bytes::Bytes;

    fn record(size: usize) -> ImageRecord {
        let content = Bytes::from(vec![0u8; size]);
        ImageRecord {
            key: "1".into(),
            name: "dawn.jpg".into(),
            width: 4000,
            height: 3000,
            format: SourceFormat::Jpeg,
            preview_uri: DataUriLocators.create(&Bytes::new(), "image/jpeg"),
            content,
        }
    }

    fn result(width: u32, height: u32, size: usize) -> ProcessResult {
        ProcessResult {
            width,
            height,
            content: Bytes::from(vec![0u8; size]),
            preview_uri: DataUriLocators.create(&Bytes::new(), "image/jpeg"),
        }
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn savings_is_negative_when_smaller() {
        assert_eq!(savings_percent(200, 50), -75.0);
        assert_eq!(savings_percent(100, 150), 50.0);
        assert_eq!(savings_percent(0, 10), 0.0);
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn measure_output() {
        assert_eq!(
            format_measure_output(&record(2048)),
            vec!["dawn.jpg", "    JPEG 4000x3000, 2.0 KB"]
        );
    }

    #[test]
    fn compress_output_with_preview() {
        let outcome = CompressOutcome {
            result: result(1200, 900, 512),
            fallback: None,
        };
        let preview = result(256, 192, 10);
        let lines = format_compress_output(
            &record(2048),
            &outcome,
            Path::new("out/dawn.min.jpg"),
            Some((Path::new("out/dawn.preview.jpg"), &preview)),
        );
        assert_eq!(
            lines,
            vec![
                "dawn.jpg",
                "    JPEG 4000x3000, 2.0 KB",
                "    Output: dawn.min.jpg 1200x900, 512 B (-75.0%)",
                "    Preview: dawn.preview.jpg 256x192",
            ]
        );
    }

    #[test]
    fn compress_output_with_fallback_reason() {
        let outcome = CompressOutcome {
            result: result(4000, 3000, 100),
            fallback: Some(FallbackReason::NotSmaller {
                original: 100,
                compressed: 130,
            }),
        };
        let lines = format_compress_output(&record(100), &outcome, Path::new("dawn.min.jpg"), None);
        assert_eq!(lines[2], "    Output: dawn.min.jpg 4000x3000, 100 B (original kept)");
        assert_eq!(
            lines[3],
            "    Reason: compressed output (130 B) is not smaller than the original (100 B)"
        );
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn preview_output() {
        let lines = format_preview_output(&record(10), Path::new("p.jpg"), &result(256, 192, 1536));
        assert_eq!(lines[2], "    Preview: p.jpg 256x192, 1.5 KB");
    }
}
