use super::topology::ParseAnomaly;

/// One physical source line after lexical preprocessing.
#[derive(Debug, Clone)]
pub struct SourceLine<'a> {
    /// 1-based line number
    pub number: usize,
    pub raw: &'a str,
    /// Line with comments removed and string literal contents emptied
    /// (`"abc"` becomes `""`), so neither can contribute braces or tokens.
    pub code: String,
    pub depth_before: usize,
    pub depth_after: usize,
}

impl SourceLine<'_> {
    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// True for lines that carry no code at all (blank or comment-only).
    pub fn is_code_empty(&self) -> bool {
        self.code.trim().is_empty()
    }

    pub fn trimmed(&self) -> &str {
        self.code.trim()
    }
}

/// Result of the shared tokenization pass that every parser stage and rule consumes.
#[derive(Debug, Clone)]
pub struct ScannedSource<'a> {
    pub lines: Vec<SourceLine<'a>>,
    pub max_depth: usize,
    pub anomalies: Vec<ParseAnomaly>,
}

impl<'a> ScannedSource<'a> {
    /// Get a line by 1-based number.
    pub fn line(&self, number: usize) -> Option<&SourceLine<'a>> {
        self.lines.get(number.checked_sub(1)?)
    }

    /// Raw text for an inclusive 1-based range.
    pub fn snippet(&self, start_line: usize, end_line: usize) -> Option<String> {
        let start = start_line.checked_sub(1)?;
        let end = end_line.min(self.lines.len());
        if start >= end {
            return None;
        }
        Some(
            self.lines[start..end]
                .iter()
                .map(|l| l.raw)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

/// Split source into lines, strip comments and string contents, and track
/// brace depth. Never fails; irregularities are recorded as anomalies.
pub fn scan(source: &str) -> ScannedSource<'_> {
    let mut lines = Vec::new();
    let mut anomalies = Vec::new();
    let mut depth: usize = 0;
    let mut max_depth: usize = 0;
    let mut in_block_comment = false;
    let mut block_comment_start = 0;

    for (idx, raw) in source.lines().enumerate() {
        let number = idx + 1;
        let depth_before = depth;
        let mut code = String::with_capacity(raw.len());
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            if in_block_comment {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    in_block_comment = false;
                    code.push(' ');
                }
                continue;
            }

            match c {
                '/' if chars.peek() == Some(&'/') => break,
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    in_block_comment = true;
                    block_comment_start = number;
                }
                '"' | '\'' => {
                    code.push(c);
                    while let Some(n) = chars.next() {
                        if n == '\\' {
                            chars.next();
                        } else if n == c {
                            break;
                        }
                    }
                    code.push(c);
                }
                '{' => {
                    depth += 1;
                    max_depth = max_depth.max(depth);
                    code.push(c);
                }
                '}' => {
                    if depth == 0 {
                        anomalies.push(ParseAnomaly::UnbalancedBraces { line: number });
                    } else {
                        depth -= 1;
                    }
                    code.push(c);
                }
                _ => code.push(c),
            }
        }

        lines.push(SourceLine {
            number,
            raw,
            code,
            depth_before,
            depth_after: depth,
        });
    }

    if in_block_comment {
        anomalies.push(ParseAnomaly::UnterminatedComment {
            line: block_comment_start,
        });
    }
    if depth > 0 {
        anomalies.push(ParseAnomaly::UnterminatedBlock { depth });
    }

    ScannedSource {
        lines,
        max_depth,
        anomalies,
    }
}
