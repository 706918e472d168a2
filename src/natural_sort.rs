use itertools::Itertools;
use serde_json::{Map, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Number(&'a str),
}

/// Split a key into alternating runs of non-digits and digits.
fn segments(key: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let runs = key.char_indices().group_by(|(_, c)| c.is_ascii_digit());
    for (is_digit, run) in &runs {
        let len: usize = run.map(|(_, c)| c.len_utf8()).sum();
        let piece = &key[start..start + len];
        out.push(if is_digit {
            Segment::Number(piece)
        } else {
            Segment::Text(piece)
        });
        start += len;
    }
    out
}

/// Numeric comparison of two digit runs without overflow: strip leading
/// zeros, then longer is larger, then lexicographic.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
}

fn cmp_segment(a: &Segment<'_>, b: &Segment<'_>) -> Ordering {
    match (a, b) {
        (Segment::Number(x), Segment::Number(y)) => cmp_digits(x, y),
        (Segment::Text(x), Segment::Text(y)) => x.cmp(y),
        // A number sorts before text at the same position.
        (Segment::Number(_), Segment::Text(_)) => Ordering::Less,
        (Segment::Text(_), Segment::Number(_)) => Ordering::Greater,
    }
}

/// Natural order: `pass2 < pass10 < pass11`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let sa = segments(a);
    let sb = segments(b);
    for (x, y) in sa.iter().zip(sb.iter()) {
        let ord = cmp_segment(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    // Equal prefix: shorter key first, then plain byte order so that keys
    // differing only in leading zeros still have a total order.
    sa.len().cmp(&sb.len()).then_with(|| a.cmp(b))
}

/// Rebuild a mapping so its iteration order is natural key order.
pub fn sort_mapping(map: Map<String, Value>) -> Map<String, Value> {
    let mut entries = map.into_iter().collect::<Vec<_>>();
    entries.sort_by(|(a, _), (b, _)| natural_cmp(a, b));
    entries.into_iter().collect()
}
