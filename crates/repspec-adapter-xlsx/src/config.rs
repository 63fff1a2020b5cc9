//! Codec configuration options

/// Configuration for writing and reading workbooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Spaces per nesting level in the element column of flat sheets (default: 4)
    pub indent_width: usize,
    /// Rows left blank for an empty array or performance map in a template (default: 5)
    pub blank_rows: usize,
    /// Maximum sheet-name length of the container (default: 31)
    pub max_sheet_name_len: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            indent_width: 4,
            blank_rows: 5,
            max_sheet_name_len: 31,
        }
    }
}

impl CodecConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the indent width of flat sheets
    #[must_use]
    pub fn indent_width(mut self, width: usize) -> Self {
        self.indent_width = width;
        self
    }

    /// Set the blank row count of empty template arrays
    #[must_use]
    pub fn blank_rows(mut self, rows: usize) -> Self {
        self.blank_rows = rows;
        self
    }

    /// Set the maximum sheet-name length
    #[must_use]
    pub fn max_sheet_name_len(mut self, len: usize) -> Self {
        self.max_sheet_name_len = len;
        self
    }

    /// Indent prefix for an element `depth` levels below its sheet's root.
    pub fn indent(&self, depth: usize) -> String {
        " ".repeat(self.indent_width * depth)
    }

    /// Nesting level of an indented element label.
    pub fn level_of(&self, label: &str) -> usize {
        let spaces = label.len() - label.trim_start_matches(' ').len();
        if self.indent_width == 0 {
            0
        } else {
            spaces / self.indent_width
        }
    }
}
