//! Split passage text into plain and highlighted segments for evidence display.
//!
//! Offsets are character offsets. Spans are sorted, clamped to the text and
//! never repeat text already covered by an earlier span.

use serde::{Deserialize, Serialize};

use crate::domain::EvidenceSpan;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
  pub text: String,
  pub highlighted: bool,
}

pub fn segments(text: &str, spans: &[EvidenceSpan]) -> Vec<Segment> {
  let chars: Vec<char> = text.chars().collect();
  let len = chars.len();
  let piece = |from: usize, to: usize, highlighted: bool| Segment {
    text: chars[from..to].iter().collect(),
    highlighted,
  };

  let mut sorted = spans.to_vec();
  sorted.sort_by_key(|s| (s.start, s.end));

  let mut out = Vec::new();
  let mut cursor = 0;
  for span in sorted {
    let start = span.start.min(len).max(cursor);
    let end = span.end.min(len);
    if end <= start {
      continue;
    }
    if start > cursor {
      out.push(piece(cursor, start, false));
    }
    out.push(piece(start, end, true));
    cursor = end;
  }
  if cursor < len {
    out.push(piece(cursor, len, false));
  }
  out
}
