//! Per-file extraction results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The values extracted from one input file.
///
/// `data` holds only fields that resolved; missing columns render as empty
/// cells. Ad-hoc runs may store an empty string for a field that was attempted
/// but yielded nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Base name of the input file.
    pub filename: String,

    /// Field name to extracted value.
    pub data: HashMap<String, String>,
}

impl Record {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            data: HashMap::new(),
        }
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.data.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.data.get(field).map(String::as_str)
    }

    /// Cells for `columns`, in order, with missing fields as empty strings.
    pub fn row(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| self.get(c).unwrap_or_default().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_row_fills_missing_cells() {
        let mut record = Record::new("a.pdf");
        record.insert("date", "2020-01-01");
        let columns = vec!["amount".to_string(), "date".to_string()];
        assert_eq!(record.row(&columns), vec!["", "2020-01-01"]);
    }
}
