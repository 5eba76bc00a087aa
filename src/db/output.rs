//! Query result sets rendered as text.

use std::fmt;

/// Header shown for unnamed columns such as `COUNT(*)`.
const UNNAMED_COLUMN: &str = "(no column name)";

/// One result set with every cell already converted to text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    /// Cells in column order; `None` is SQL NULL
    pub rows: Vec<Vec<Option<String>>>,
    /// More rows were available than were fetched
    pub truncated: bool,
}

impl QueryOutput {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            columns,
            rows,
            truncated: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Value of `column` in `row`, if present and not NULL.
    pub fn get(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column)?.as_deref()
    }

    /// Render as a pipe-separated table, showing at most `max_rows` rows.
    pub fn render(&self, max_rows: usize) -> String {
        let headers: Vec<&str> = self
            .columns
            .iter()
            .map(|c| if c.is_empty() { UNNAMED_COLUMN } else { c.as_str() })
            .collect();
        let shown = &self.rows[..self.rows.len().min(max_rows)];

        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in shown {
            for (i, cell) in row.iter().enumerate() {
                let len = cell_text(cell).chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(len),
                    None => widths.push(len),
                }
            }
        }

        let mut lines = Vec::with_capacity(shown.len() + 3);
        lines.push(render_line(headers.iter().copied(), &widths));
        lines.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for row in shown {
            lines.push(render_line(row.iter().map(cell_text), &widths));
        }

        let hidden = self.rows.len() - shown.len();
        if hidden > 0 {
            lines.push(format!("({} more rows)", hidden));
        } else if self.truncated {
            lines.push("(more rows not fetched)".to_string());
        }

        lines.join("\n")
    }
}

impl fmt::Display for QueryOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(usize::MAX))
    }
}

fn cell_text(cell: &Option<String>) -> &str {
    cell.as_deref().unwrap_or("NULL")
}

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}
