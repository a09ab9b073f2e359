const BYTE_ORDER_MARK: char = '\u{feff}';

/// Best-effort cleanup of a completion that failed to parse.
///
/// Line breaks, tabs and other non-control whitespace collapse to a single
/// space. Every other control character (C0, DEL, C1, including NEL and
/// vertical tab) is dropped, as is a byte-order mark. The result is trimmed.
/// Never fails.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for ch in raw.chars() {
        if matches!(ch, '\n' | '\r' | '\t') || (ch.is_whitespace() && !ch.is_control()) {
            pending_space = true;
            continue;
        }
        if ch.is_control() || ch == BYTE_ORDER_MARK {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }

    out
}
