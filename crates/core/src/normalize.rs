use unicode_normalization::UnicodeNormalization;

/// Canonicalizes raw extracted text: NFKC unicode normalization, control
/// character stripping, and whitespace-run collapsing. Paragraph boundaries
/// (blank-line separated blocks) survive as `\n\n` markers so the chunker
/// can still segment by paragraph after collapsing, and heading lines are
/// kept as standalone paragraphs so splitting can anchor on them.
///
/// Pure function. Handing it non-text bytes is a caller contract violation,
/// not a runtime error.
pub fn normalize_text(raw: &str) -> String {
    let composed: String = raw.nfkc().collect();
    let cleaned: String = composed
        .chars()
        .filter(|c| !is_stripped_control(*c))
        .collect();

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in cleaned.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush_paragraph(&mut paragraphs, &mut current);
        } else if is_heading_line(trimmed) {
            flush_paragraph(&mut paragraphs, &mut current);
            paragraphs.push(collapse_spaces(trimmed));
        } else {
            current.push(trimmed);
        }
    }
    flush_paragraph(&mut paragraphs, &mut current);

    paragraphs.join("\n\n")
}

fn flush_paragraph(paragraphs: &mut Vec<String>, lines: &mut Vec<&str>) {
    if lines.is_empty() {
        return;
    }
    let joined = lines.join(" ");
    lines.clear();
    let collapsed = collapse_spaces(&joined);
    if !collapsed.is_empty() {
        paragraphs.push(collapsed);
    }
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_heading_line(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    hashes > 0
        && line[hashes..]
            .chars()
            .next()
            .is_some_and(|c| c.is_whitespace())
}

fn is_stripped_control(c: char) -> bool {
    c.is_control() && c != '\n' && c != '\t' && c != '\r'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_runs_collapse_to_single_spaces() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_text(input), "A lot of spacing");
    }

    #[test]
    fn paragraph_boundaries_survive_collapsing() {
        let input = "first block\ncontinues here\n\n\nsecond   block";
        assert_eq!(
            normalize_text(input),
            "first block continues here\n\nsecond block"
        );
    }

    #[test]
    fn heading_lines_become_their_own_paragraphs() {
        let input = "# Title\nbody text right after\nmore body";
        assert_eq!(
            normalize_text(input),
            "# Title\n\nbody text right after more body"
        );
    }

    #[test]
    fn control_characters_are_stripped() {
        let input = "abc\u{0000}def\u{0007}";
        assert_eq!(normalize_text(input), "abcdef");
    }

    #[test]
    fn unicode_is_composed() {
        // U+FB01 LATIN SMALL LIGATURE FI decomposes under NFKC.
        assert_eq!(normalize_text("\u{FB01}le"), "file");
    }

    #[test]
    fn empty_and_blank_input_yield_empty_output() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("  \n\n \t "), "");
    }
}
