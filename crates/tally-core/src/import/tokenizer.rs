//! CSV line tokenizer
//!
//! Vendor exports are loose about CSV: title rows above the header, ragged
//! row lengths, padded cells. Lines are therefore split and tokenized one
//! at a time instead of going through a strict reader. Quoted cells may
//! contain commas and doubled quotes but not line breaks.

/// Split raw file text into non-blank lines, dropping a leading BOM
pub fn split_lines(text: &str) -> Vec<&str> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Tokenize one CSV line into trimmed cells.
///
/// `a,"b,c","d""e"` becomes `["a", "b,c", "d\"e"]`.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());

    cells
}
