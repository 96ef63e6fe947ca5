//! Parser for column-aligned `show` command tables.
//!
//! SONiC prints each table as a group title, a header line, a separator line
//! of dashes and then one line per row:
//!
//! ```text
//! ERSPAN Sessions
//! Name            Status    SRC IP     DST IP     GRE     DSCP    TTL    Queue    Policer    Monitor Port    SRC Port    Direction
//! --------------  --------  ---------  ---------  ------  ------  -----  -------  ---------  --------------  ----------  -----------
//! test_session_1  active    1.1.1.1    2.2.2.2    0x88be  8       4                          Ethernet4
//! ```
//!
//! Column boundaries come from the dash runs of the separator line; the
//! header text is only used for names. Groups are separated by blank lines
//! and keyed by their title line exactly as printed.

use serde::Serialize;
use std::collections::BTreeMap;

/// Number of characters between two columns of the separator line.
pub const COLUMN_GAP: usize = 2;

/// Title of the ERSPAN table in `show mirror_session` output.
pub const ERSPAN_SESSIONS_GROUP: &str = "ERSPAN Sessions";

/// One data row, with columns in separator order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableRecord {
    columns: Vec<(String, String)>,
}

impl TableRecord {
    /// Value of column `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Sets a column; a repeated name keeps its first position and takes the
    /// latest value.
    fn insert(&mut self, name: String, value: String) {
        match self.columns.iter_mut().find(|(column, _)| *column == name) {
            Some(entry) => entry.1 = value,
            None => self.columns.push((name, value)),
        }
    }
}

/// A titled table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableGroup {
    pub name: String,
    pub records: Vec<TableRecord>,
}

impl TableGroup {
    /// First record whose `column` equals `value`.
    pub fn find(&self, column: &str, value: &str) -> Option<&TableRecord> {
        self.records.iter().find(|r| r.get(column) == Some(value))
    }
}

/// Parsed tables keyed by group title.
pub type TableGroups = BTreeMap<String, TableGroup>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Looking for the next group title.
    Between,
    /// Reading data rows of the current group.
    Rows,
}

/// Parses every group in `lines`.
///
/// Scanning stops when fewer than three lines (title, header, separator)
/// remain after skipping blank lines. A later group with the same title
/// replaces an earlier one.
pub fn parse_sessions<S: AsRef<str>>(lines: &[S]) -> TableGroups {
    let mut groups = TableGroups::new();
    let mut state = ScanState::Between;
    let mut current: Option<(TableGroup, Vec<usize>, &str)> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].as_ref();
        match state {
            ScanState::Between => {
                if line.trim().is_empty() {
                    i += 1;
                    continue;
                }
                if lines.len() - i < 3 {
                    break;
                }
                let header = lines[i + 1].as_ref();
                let widths = lines[i + 2]
                    .as_ref()
                    .split_whitespace()
                    .map(|token| token.chars().count())
                    .collect();
                current = Some((
                    TableGroup {
                        name: line.to_string(),
                        records: Vec::new(),
                    },
                    widths,
                    header,
                ));
                state = ScanState::Rows;
                i += 3;
            }
            ScanState::Rows => {
                if line.trim().is_empty() {
                    if let Some((group, _, _)) = current.take() {
                        groups.insert(group.name.clone(), group);
                    }
                    state = ScanState::Between;
                } else if let Some((group, widths, header)) = current.as_mut() {
                    group.records.push(parse_row(*header, line, widths));
                }
                i += 1;
            }
        }
    }

    if let Some((group, _, _)) = current {
        groups.insert(group.name.clone(), group);
    }
    groups
}

fn parse_row(header: &str, line: &str, widths: &[usize]) -> TableRecord {
    let mut record = TableRecord::default();
    let mut start = 0;
    for width in widths {
        let end = start + width;
        record.insert(
            char_slice(header, start, end).trim().to_string(),
            char_slice(line, start, end).trim().to_string(),
        );
        start = end + COLUMN_GAP;
    }
    record
}

/// Characters `start..end` of `s`, clamped to its length.
fn char_slice(s: &str, start: usize, end: usize) -> &str {
    let mut indices = s.char_indices().map(|(i, _)| i).chain(std::iter::once(s.len()));
    let Some(from) = indices.nth(start) else {
        return "";
    };
    let to = indices.nth(end.saturating_sub(start + 1)).unwrap_or(s.len());
    &s[from..to.max(from)]
}
