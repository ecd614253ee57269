//! Slide source splitting.

/// Line content that separates two slides.
///
/// There is no escape syntax: a slide cannot contain a line that is exactly
/// the delimiter.
pub const SLIDE_DELIMITER: &str = "---";

/// Split a slide source into whitespace-trimmed segments.
///
/// A line whose trimmed content equals [`SLIDE_DELIMITER`] ends the current
/// segment. Every segment is kept, including empty ones, so the number of
/// slides is always one more than the number of delimiter lines.
pub fn split_slides(source: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in source.split_inclusive('\n') {
        if line.trim() == SLIDE_DELIMITER {
            segments.push(source[start..offset].trim());
            start = offset + line.len();
        }
        offset += line.len();
    }
    segments.push(source[start..].trim());

    segments
}
