//! Case-insensitive matching of a typed query against one candidate name.
//!
//! A query either appears as one unbroken run of the name (a continuous match)
//! or is split, greedily and left to right, into the fewest runs that appear in
//! order (a separated match). Continuous matches always outrank separated ones.

use serde::{Deserialize, Serialize};

use crate::model::fold_case;

pub const CONTINUOUS_BASE_SCORE: i64 = 10_000;
pub const SEPARATED_BASE_SCORE: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Empty query; everything matches and nothing is highlighted.
    Empty,
    Continuous,
    Separated,
    None,
}

/// Byte range into the original, un-folded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: bool,
    pub score: i64,
    pub kind: MatchKind,
    pub spans: Vec<Span>,
}

impl MatchResult {
    fn empty_query() -> Self {
        Self {
            matched: true,
            score: 0,
            kind: MatchKind::Empty,
            spans: Vec::new(),
        }
    }

    fn no_match() -> Self {
        Self {
            matched: false,
            score: 0,
            kind: MatchKind::None,
            spans: Vec::new(),
        }
    }

    /// The highlighted runs as slices of `text`, which must be the text this
    /// result was computed for.
    pub fn segments<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.spans
            .iter()
            .filter_map(|span| text.get(span.start..span.end))
            .collect()
    }
}

/// One piece of rendered output: either untouched text or a highlighted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlighted<'a> {
    pub text: &'a str,
    pub highlighted: bool,
}

pub fn match_text(text: &str, query: &str) -> MatchResult {
    let query = query.trim();
    if query.is_empty() {
        return MatchResult::empty_query();
    }

    let (folded_text, origins) = fold_case(text);
    let (folded_query, _) = fold_case(query);

    if let Some(position) = find_from(&folded_text, &folded_query, 0) {
        let runs = [(position, position + folded_query.len())];
        return MatchResult {
            matched: true,
            score: CONTINUOUS_BASE_SCORE + text.chars().count() as i64,
            kind: MatchKind::Continuous,
            spans: to_byte_spans(text, &origins, &runs),
        };
    }

    let Some(runs) = separated_runs(&folded_text, &folded_query) else {
        return MatchResult::no_match();
    };

    let total_gap: i64 = runs
        .windows(2)
        .map(|pair| (pair[1].0 - pair[0].1) as i64)
        .sum();

    MatchResult {
        matched: true,
        score: SEPARATED_BASE_SCORE - total_gap,
        kind: MatchKind::Separated,
        spans: to_byte_spans(text, &origins, &runs),
    }
}

/// Splits `query` into runs found in order inside `text`.
///
/// At every step the longest unconsumed prefix of the query that occurs at or
/// after the end of the previous run wins. The segmentation is greedy, not
/// optimal: a short early run can starve the rest of the query even when a
/// different split would have matched.
fn separated_runs(text: &[char], query: &[char]) -> Option<Vec<(usize, usize)>> {
    let mut runs = Vec::new();
    let mut query_index = 0;
    let mut lower_bound = 0;

    while query_index < query.len() {
        let remaining = &query[query_index..];
        let (start, run_len) = (1..=remaining.len())
            .rev()
            .find_map(|len| find_from(text, &remaining[..len], lower_bound).map(|at| (at, len)))?;

        runs.push((start, start + run_len));
        query_index += run_len;
        lower_bound = start + run_len;
    }

    Some(runs)
}

fn find_from(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() || needle.len() > haystack.len() - from {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

/// Maps runs over folded characters back to byte ranges of `text`.
///
/// Runs that split a character which folded into several characters are
/// widened to the whole source character and merged with their neighbour if
/// they would otherwise overlap.
fn to_byte_spans(text: &str, origins: &[usize], runs: &[(usize, usize)]) -> Vec<Span> {
    let mut boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
    boundaries.push(text.len());

    let mut spans: Vec<Span> = Vec::with_capacity(runs.len());
    for &(start, end) in runs {
        if start >= end || end > origins.len() {
            continue;
        }
        let span = Span {
            start: boundaries[origins[start]],
            end: boundaries[origins[end - 1] + 1],
        };
        if let Some(previous) = spans.last_mut() {
            if span.start < previous.end {
                previous.end = previous.end.max(span.end);
                continue;
            }
        }
        spans.push(span);
    }
    spans
}

/// Splits `text` into plain and highlighted pieces, in order, covering all of it.
pub fn highlight<'a>(text: &'a str, spans: &[Span]) -> Vec<Highlighted<'a>> {
    let mut pieces = Vec::with_capacity(spans.len() * 2 + 1);
    let mut cursor = 0;
    for span in spans {
        let (Some(before), Some(run)) = (text.get(cursor..span.start), text.get(span.start..span.end))
        else {
            continue;
        };
        if !before.is_empty() {
            pieces.push(Highlighted {
                text: before,
                highlighted: false,
            });
        }
        if !run.is_empty() {
            pieces.push(Highlighted {
                text: run,
                highlighted: true,
            });
        }
        cursor = span.end;
    }
    if let Some(rest) = text.get(cursor..) {
        if !rest.is_empty() {
            pieces.push(Highlighted {
                text: rest,
                highlighted: false,
            });
        }
    }
    pieces
}

/// Wraps every highlighted run in `open`/`close` markers.
pub fn render_markup(text: &str, spans: &[Span], open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len() + spans.len() * (open.len() + close.len()));
    for piece in highlight(text, spans) {
        if piece.highlighted {
            out.push_str(open);
            out.push_str(piece.text);
            out.push_str(close);
        } else {
            out.push_str(piece.text);
        }
    }
    out
}
