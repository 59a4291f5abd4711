//! Structured-payload extraction from raw actor output.
//!
//! Actor text routinely wraps its JSON in markdown fences, chain-of-thought
//! preambles (`<think>...</think>`, "Let me think..."), or trailing prose.
//! [`extract_json`] strips the wrapping and returns the first top-level object
//! or array, matched by bracket depth. The scan is string-aware: brackets
//! inside quoted text are ignored and escape sequences are honored.

/// Extract a JSON object or array from text that may contain surrounding
/// content. Returns the input unchanged when no JSON structure is found, so
/// the parse error downstream points at the real payload.
pub fn extract_json(text: &str) -> &str {
    if text.trim().is_empty() {
        return text;
    }

    let candidate = strip_code_fence(text);

    let bytes = candidate.as_bytes();
    let obj_start = candidate.find('{');
    let arr_start = candidate.find('[');

    let (start, open, close) = match (obj_start, arr_start) {
        (None, None) => return candidate,
        (Some(o), None) => (o, b'{', b'}'),
        (None, Some(a)) => (a, b'[', b']'),
        (Some(o), Some(a)) if o <= a => (o, b'{', b'}'),
        (_, Some(a)) => (a, b'[', b']'),
    };

    // Depth-matched scan. Bracket and quote characters are ASCII, so byte
    // indexing stays on char boundaries.
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escape_next {
            escape_next = false;
            continue;
        }
        match b {
            b'\\' => {
                if in_string {
                    escape_next = true;
                }
            }
            b'"' => in_string = !in_string,
            _ if in_string => {}
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return &candidate[start..=i];
                }
            }
            _ => {}
        }
    }

    // Unbalanced payload: fall back to the last closing bracket.
    match candidate.rfind(close as char) {
        Some(last) if last > start => &candidate[start..=last],
        _ => candidate,
    }
}

/// Strip a markdown code fence (with or without a `json` language tag),
/// tolerating prose before and after the fenced block.
fn strip_code_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let mut body = &text[open + 3..];
    if let Some(stripped) = body.strip_prefix("json") {
        body = stripped;
    }
    let body = body.trim_start();
    match body.find("```") {
        Some(end) => body[..end].trim_end(),
        None => text,
    }
}
