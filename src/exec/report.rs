//! Operator-facing status stream and list report
//!
//! Progress lines go straight to stdout as transitions happen; `list`
//! rows are collected for one fixed-width table rendered at run end.

use crate::cluster::Description;
use crate::error::{FlotillaError, Result};
use std::sync::Mutex;

/// Column headers of the list table
const LIST_HEADERS: [&str; 3] = ["TARGET", "TAGS", "COMMANDS"];

/// Collects report rows and emits progress lines
#[derive(Default)]
pub struct Reporter {
    rows: Mutex<Vec<Description>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit one progress line
    pub fn progress(&self, line: impl std::fmt::Display) {
        println!("{}", line);
    }

    /// Record one list row
    pub fn list_row(&self, row: Description) -> Result<()> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| FlotillaError::Lock("Failed to acquire report lock".to_string()))?;
        rows.push(row);
        Ok(())
    }

    /// Render the collected rows as a fixed-width table
    pub fn render_table(&self) -> Result<String> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| FlotillaError::Lock("Failed to acquire report lock".to_string()))?
            .clone();
        rows.sort();

        let mut widths = [LIST_HEADERS[0].len(), LIST_HEADERS[1].len()];
        for row in &rows {
            widths[0] = widths[0].max(row.target.len());
            widths[1] = widths[1].max(row.tags.len());
        }

        let mut out = format!(
            "{:<tw$}  {:<gw$}  {}\n",
            LIST_HEADERS[0],
            LIST_HEADERS[1],
            LIST_HEADERS[2],
            tw = widths[0],
            gw = widths[1],
        );
        for row in &rows {
            out.push_str(&format!(
                "{:<tw$}  {:<gw$}  {}\n",
                row.target,
                row.tags,
                row.commands,
                tw = widths[0],
                gw = widths[1],
            ));
        }

        Ok(out)
    }

    /// Number of collected rows
    pub fn row_count(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }
}
