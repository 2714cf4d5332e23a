//! Artifact assembly.
//!
//! An artifact is a header, the entries in extraction order and, for the
//! package bundle, the cache-state statement. Every chunk of text goes through
//! [`clean`] before it is inserted; nothing is reordered.

use loadout_reader::Reader;

use crate::entry::Entry;

/// First line of every artifact.
pub const MODE_LINE: &str = ";; -*- lexical-binding: t; -*-";

/// Marker closing the aggregation artifact; content is inserted before it.
pub const END_MARKER: &str = ";; loadout-end-of-forms";

/// Header comments that carry no meaning once the text is bundled.
const DROPPED_HEADERS: &[&str] = &[
    "Author:",
    "Maintainer:",
    "Keywords:",
    "URL:",
    "Homepage:",
    "Version:",
    "Package-Requires:",
    "Package-Version:",
    "Created:",
    "Copyright",
];

/// The header of an artifact produced by `loadout generate <kind>`.
pub fn header(kind: &str) -> String {
    format!(
        "{MODE_LINE}\n;; This file was autogenerated by `loadout generate {kind}`, DO NOT EDIT\n\n"
    )
}

/// Byte ranges of the top-level forms of `chunk`, in order. Reading stops at
/// the first error.
fn form_spans(chunk: &str) -> Vec<(usize, usize)> {
    let mut reader = Reader::new(chunk);
    let mut spans = Vec::new();
    while let Ok(Some(form)) = reader.read_next() {
        spans.push((form.span.start as usize, form.span.end as usize));
    }
    spans
}

/// Removes lines that would stop the bundle from compiling or that only
/// matter in the file they came from.
///
/// Dropped: `;;;` comment lines, `Local Variables:` blocks, lines mentioning
/// `no-byte-compile`, and author or editor header comments. Only lines that
/// start between top-level forms are candidates; a line that continues a form
/// (inside a multi-line string, say) is always kept.
pub fn clean(chunk: &str) -> String {
    let spans = form_spans(chunk);
    let mut next_span = 0;
    let mut out = Vec::new();
    let mut in_locals = false;
    let mut offset = 0;
    for raw in chunk.split_inclusive('\n') {
        let line_start = offset;
        offset += raw.len();
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);

        while spans.get(next_span).is_some_and(|&(_, end)| end <= line_start) {
            next_span += 1;
        }
        let inside_form = spans
            .get(next_span)
            .is_some_and(|&(start, _)| start < line_start);

        let trimmed = line.trim_start();
        if inside_form || !trimmed.starts_with(';') {
            in_locals = false;
            out.push(line);
            continue;
        }
        let comment = trimmed.trim_start_matches(';').trim();
        if in_locals {
            if comment.starts_with("End:") {
                in_locals = false;
            }
            continue;
        }
        if comment.starts_with("Local Variables:") {
            in_locals = true;
            continue;
        }
        let drop = trimmed.starts_with(";;;")
            || comment.contains("no-byte-compile")
            || DROPPED_HEADERS.iter().any(|h| comment.starts_with(h));
        if !drop {
            out.push(line);
        }
    }
    while out.last().is_some_and(|l| l.trim().is_empty()) {
        out.pop();
    }
    let first = out.iter().position(|l| !l.trim().is_empty()).unwrap_or(out.len());
    out[first..].join("\n")
}

/// An artifact being assembled.
#[derive(Debug, Clone)]
pub struct ArtifactBuffer {
    body: String,
    marked: bool,
}

impl ArtifactBuffer {
    /// Starts an artifact of `kind`. With `marked`, the text ends with
    /// [`END_MARKER`] and every insertion lands just before it.
    pub fn new(kind: &str, marked: bool) -> Self {
        Self {
            body: header(kind),
            marked,
        }
    }

    /// Cleans `chunk` and appends it. Chunks that clean to nothing are
    /// skipped.
    pub fn insert(&mut self, chunk: &str) {
        let cleaned = clean(chunk);
        if cleaned.is_empty() {
            return;
        }
        self.body.push_str(&cleaned);
        self.body.push('\n');
    }

    /// Inserts each entry on its own.
    pub fn insert_entries(&mut self, entries: &[Entry]) {
        for entry in entries {
            self.insert(&entry.to_string());
        }
    }

    /// The finished artifact text.
    pub fn finish(mut self) -> String {
        if self.marked {
            self.body.push_str(END_MARKER);
            self.body.push('\n');
        }
        self.body
    }
}

/// Assembles a whole artifact: header, `chunks` in order, then `cache_state`
/// if given. Only the aggregation artifact (no cache state) carries
/// [`END_MARKER`].
pub fn assemble(kind: &str, chunks: &[String], cache_state: Option<&str>) -> String {
    let mut buffer = ArtifactBuffer::new(kind, cache_state.is_none());
    for chunk in chunks {
        buffer.insert(chunk);
    }
    if let Some(state) = cache_state {
        buffer.insert(state);
    }
    buffer.finish()
}
