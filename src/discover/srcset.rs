//! `srcset` attribute parsing.
//!
//! Candidate URLs may contain commas (`image.png?w=1,2`), so the value is
//! not simply split on `,`: a URL runs until whitespace, and only a comma
//! *after* the URL and its descriptors separates candidates.

/// One image candidate of a `srcset` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcsetCandidate {
    pub url: String,
    /// Width or density descriptor (`480w`, `2x`), empty when absent.
    pub descriptor: String,
}

/// Splits a `srcset` value into candidates, in order.
pub fn parse_srcset(value: &str) -> Vec<SrcsetCandidate> {
    let mut candidates = Vec::new();
    let mut rest = value;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let url_end = rest
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(rest.len());
        let (raw_url, after) = rest.split_at(url_end);

        // A URL ending in commas has no descriptors
        let trimmed_url = raw_url.trim_end_matches(',');
        if trimmed_url.len() != raw_url.len() {
            candidates.push(SrcsetCandidate {
                url: trimmed_url.to_string(),
                descriptor: String::new(),
            });
            rest = after;
            continue;
        }

        let descriptor_end = descriptor_end(after);
        let descriptor = after[..descriptor_end].trim();
        candidates.push(SrcsetCandidate {
            url: raw_url.to_string(),
            descriptor: descriptor.to_string(),
        });
        rest = &after[descriptor_end..];
    }

    candidates
}

/// Byte offset of the comma ending a descriptor list, ignoring commas inside
/// parentheses.
fn descriptor_end(descriptors: &str) -> usize {
    let mut depth = 0usize;
    for (index, c) in descriptors.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return index,
            _ => {}
        }
    }
    descriptors.len()
}

/// Joins candidates back into a `srcset` value.
pub fn format_srcset(candidates: &[SrcsetCandidate]) -> String {
    candidates
        .iter()
        .map(|candidate| {
            if candidate.descriptor.is_empty() {
                candidate.url.clone()
            } else {
                format!("{} {}", candidate.url, candidate.descriptor)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
