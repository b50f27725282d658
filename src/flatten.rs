use crate::config::Config;
use crate::reader::RawTable;
use tracing::warn;

/// Table contents joined into a single prompt-ready block of text.
///
/// The character count never exceeds the budget the text was produced with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedText {
    text: String,
    truncated: bool,
}

impl FlattenedText {
    /// Returns the flattened text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of characters (Unicode scalar values).
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Returns true if the joined table was cut to fit the budget.
    #[must_use]
    pub const fn was_truncated(&self) -> bool {
        self.truncated
    }

    /// Returns true if there is no text at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Consumes the wrapper, returning the text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}

/// Joins cells and rows and applies the character budget.
///
/// The cut is a hard cutoff and may fall in the middle of a row or cell.
#[derive(Debug, Clone, Copy)]
pub struct Flattener {
    delimiter: char,
    max_chars: usize,
}

impl Flattener {
    /// Creates a flattener from configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_limits(config.cell_delimiter, config.max_input_chars)
    }

    /// Creates a flattener with an explicit delimiter and budget.
    #[must_use]
    pub const fn with_limits(delimiter: char, max_chars: usize) -> Self {
        Self {
            delimiter,
            max_chars,
        }
    }

    /// Flattens the table. An empty table yields empty text.
    #[must_use]
    pub fn flatten(&self, table: &RawTable) -> FlattenedText {
        let mut delim = [0u8; 4];
        let delim: &str = self.delimiter.encode_utf8(&mut delim);

        let mut text = table
            .rows()
            .iter()
            .map(|row| row.join(delim))
            .collect::<Vec<_>>()
            .join("\n");

        let truncated = truncate_chars(&mut text, self.max_chars);
        if truncated {
            warn!(
                "Input text exceeds {} characters, trailing rows were cut",
                self.max_chars
            );
        }

        FlattenedText { text, truncated }
    }
}

/// Cuts `text` to at most `max` characters. Returns true if anything was cut.
fn truncate_chars(text: &mut String, max: usize) -> bool {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => {
            text.truncate(byte_idx);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> RawTable {
        rows.iter()
            .map(|r| r.iter().map(|c| (*c).to_string()).collect())
            .collect::<Vec<Vec<String>>>()
            .into()
    }

    #[test]
    fn test_flatten_scenario() {
        let flattener = Flattener::with_limits('\t', 15_000);
        let text = flattener.flatten(&table(&[&["Acme", "X100"], &["Globex", "Y200"]]));

        assert_eq!(text.as_str(), "Acme\tX100\nGlobex\tY200");
        assert!(!text.was_truncated());
    }

    #[test]
    fn test_empty_table() {
        let flattener = Flattener::with_limits('\t', 10);
        let text = flattener.flatten(&RawTable::default());
        assert!(text.is_empty());
        assert!(!text.was_truncated());
    }

    #[test]
    fn test_ragged_rows_preserved() {
        let flattener = Flattener::with_limits('\t', 100);
        let text = flattener.flatten(&table(&[&["a", "b", "c"], &["d"], &[], &["", "e"]]));
        assert_eq!(text.as_str(), "a\tb\tc\nd\n\n\te");
    }

    #[test]
    fn test_truncates_to_budget() {
        let flattener = Flattener::with_limits('\t', 7);
        let text = flattener.flatten(&table(&[&["Acme", "X100"], &["Globex", "Y200"]]));

        assert_eq!(text.as_str(), "Acme\tX1");
        assert_eq!(text.char_count(), 7);
        assert!(text.was_truncated());
    }

    #[test]
    fn test_exact_budget_not_truncated() {
        let flattener = Flattener::with_limits('\t', 9);
        let text = flattener.flatten(&table(&[&["Acme", "X100"]]));
        assert_eq!(text.as_str(), "Acme\tX100");
        assert!(!text.was_truncated());
    }

    #[test]
    fn test_budget_counts_characters_not_bytes() {
        let flattener = Flattener::with_limits(';', 3);
        let text = flattener.flatten(&table(&[&["Ünïcödé"]]));
        assert_eq!(text.as_str(), "Ünï");
        assert_eq!(text.char_count(), 3);
    }

    #[test]
    fn test_budget_invariant_over_sizes() {
        let rows: Vec<Vec<String>> = (0..200)
            .map(|i| vec![format!("OEM{i}"), format!("Model-{i}"), "x".repeat(i % 7)])
            .collect();
        let table = RawTable::new(rows);

        for budget in [0, 1, 5, 64, 1_000, 100_000] {
            let text = Flattener::with_limits('\t', budget).flatten(&table);
            assert!(text.char_count() <= budget, "budget {budget} exceeded");
        }
    }

    #[test]
    fn test_custom_delimiter() {
        let flattener = Flattener::with_limits('|', 100);
        let text = flattener.flatten(&table(&[&["a", "b"]]));
        assert_eq!(text.as_str(), "a|b");
    }
}
