use super::{SourceError, Span};

pub fn render_source_error(name: &str, source: &str, err: &SourceError) -> String {
    let code_prefix = format!("error[{}]", err.code());
    if let Some(span) = err.span() {
        let rendered = render_span_snippet(name, source, span, &err.to_string());
        return format!("{code_prefix}: {rendered}");
    }
    format!("{code_prefix}: {err}")
}

/// 1-based line and column of a byte offset, clamped to the end of the source.
pub fn line_col_for_offset(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..floor_char_boundary(source, offset)];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let col = before[line_start..].chars().count() + 1;
    (line, col)
}

fn render_span_snippet(name: &str, source: &str, span: Span, message: &str) -> String {
    let (line, col) = line_col_for_offset(source, span.lo);
    let line_text = source.lines().nth(line - 1).unwrap_or("");
    let remaining = line_text.chars().count().saturating_sub(col - 1).max(1);
    let pointer_width = span.len().clamp(1, remaining);
    let pointer = format!(
        "{}{}",
        " ".repeat(col.saturating_sub(1)),
        "^".repeat(pointer_width)
    );
    format!("{message}\n --> {name}:{line}:{col}\n  |\n{line:>3} | {line_text}\n  | {pointer}")
}

fn floor_char_boundary(source: &str, mut offset: usize) -> usize {
    while offset > 0 && !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
