//! Line-oriented tokenizer and header-labeled row parser
//!
//! Each physical line is one record. A `"` toggles quoted mode, a doubled
//! `""` inside quotes is a literal quote, and commas inside quotes are part
//! of the value. Quoted values cannot span lines. Blank lines and comment
//! lines (a single cell starting with `#`) are skipped but still counted, so
//! every row keeps the 1-based number of the line it came from.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::RawRow;
use crate::schema::{canonical_header, MANDATORY_HEADERS};

const DELIMITER: char = ',';
const QUOTE: char = '"';
const COMMENT_PREFIX: char = '#';

/// Parser output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub rows: Vec<RawRow>,
    /// Structural problems; when non-empty `rows` is empty
    pub errors: Vec<String>,
}

impl ParseOutcome {
    fn failed(errors: Vec<String>) -> Self {
        Self {
            rows: Vec::new(),
            errors,
        }
    }
}

/// Split one line into cells
///
/// Returns `None` when a quoted value is still open at end of line.
pub fn tokenize_line(line: &str) -> Option<Vec<String>> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            QUOTE if in_quotes && chars.peek() == Some(&QUOTE) => {
                current.push(QUOTE);
                chars.next();
            }
            QUOTE => in_quotes = !in_quotes,
            DELIMITER if !in_quotes => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_quotes {
        return None;
    }
    cells.push(current);
    Some(cells)
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// A comment is one cell starting with `#`; a data row whose first value
/// starts with `#` still has delimiters and is kept
fn is_comment(line: &str, cells: &[String]) -> bool {
    cells.len() == 1 && line.trim_start().starts_with(COMMENT_PREFIX)
}

/// Parse raw text into rows labeled by canonical field names
///
/// The first non-blank line is the header. Missing mandatory headers abort
/// immediately with a single error and no rows. Short data lines are padded
/// with empty values; cells beyond the header are ignored.
pub fn parse(content: &str) -> ParseOutcome {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;
        if is_blank(line) {
            continue;
        }

        let Some(cells) = tokenize_line(line) else {
            let message = format!("Linha {}: aspas não fechadas", line_number);
            if header.is_none() {
                return ParseOutcome::failed(vec![message]);
            }
            errors.push(message);
            continue;
        };
        if is_comment(line, &cells) {
            continue;
        }

        match &header {
            None => {
                let names: Vec<String> = cells.iter().map(|c| canonical_header(c)).collect();
                let missing: Vec<&str> = MANDATORY_HEADERS
                    .iter()
                    .copied()
                    .filter(|required| !names.iter().any(|n| n == required))
                    .collect();
                if !missing.is_empty() {
                    return ParseOutcome::failed(vec![format!(
                        "Headers obrigatórios ausentes: {}",
                        missing.join(", ")
                    )]);
                }
                debug!(columns = names.len(), line = line_number, "Header parsed");
                header = Some(names);
            }
            Some(names) => {
                let mut row = RawRow::new(line_number);
                for (position, name) in names.iter().enumerate() {
                    let value = cells.get(position).cloned().unwrap_or_default();
                    row.push(name.clone(), value);
                }
                rows.push(row);
            }
        }
    }

    if header.is_none() && errors.is_empty() {
        errors.push("Arquivo vazio: nenhum cabeçalho encontrado".to_string());
    }

    if !errors.is_empty() {
        return ParseOutcome::failed(errors);
    }

    debug!(rows = rows.len(), "File parsed");
    ParseOutcome { rows, errors }
}
