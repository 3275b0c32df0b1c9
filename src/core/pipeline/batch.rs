//! Raw tabular batches
//!
//! Both raw sources (decoded DBF records and the helper's Parquet cache) are
//! read into the same column-major text representation before filtering.

/// A chunk of raw records, one text vector per column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    names: Vec<String>,
    columns: Vec<Vec<Option<String>>>,
}

impl RawBatch {
    /// Builds a batch from parallel name/column vectors
    ///
    /// All columns must have the same length.
    pub fn new(names: Vec<String>, columns: Vec<Vec<Option<String>>>) -> Self {
        debug_assert_eq!(names.len(), columns.len());
        debug_assert!(columns.windows(2).all(|w| w[0].len() == w[1].len()));
        Self { names, columns }
    }

    /// Row-oriented constructor, convenient for small fixtures
    pub fn from_rows(names: &[&str], rows: &[Vec<Option<&str>>]) -> Self {
        let mut columns = vec![Vec::with_capacity(rows.len()); names.len()];
        for row in rows {
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value.map(str::to_string));
            }
        }
        Self::new(names.iter().map(|n| n.to_string()).collect(), columns)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column(&self, name: &str) -> Option<&[Option<String>]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Columns in order, paired with their names
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Option<String>])> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }

    /// Canonicalizes column names and merges columns that collide
    ///
    /// For duplicate names the merged column keeps the position of the first
    /// occurrence and takes, per row, the first non-missing value.
    pub fn normalize_columns(self) -> Self {
        let mut names: Vec<String> = Vec::with_capacity(self.names.len());
        let mut columns: Vec<Vec<Option<String>>> = Vec::with_capacity(self.columns.len());

        for (name, column) in self.names.into_iter().zip(self.columns) {
            let canonical = canonical_name(&name);
            match names.iter().position(|n| *n == canonical) {
                Some(i) => {
                    for (kept, value) in columns[i].iter_mut().zip(column) {
                        if is_missing(kept) && !is_missing(&value) {
                            *kept = value;
                        }
                    }
                }
                None => {
                    names.push(canonical);
                    columns.push(column);
                }
            }
        }

        Self { names, columns }
    }

    /// Keeps the rows whose mask entry is true
    pub fn retain_rows(self, mask: &[bool]) -> Self {
        let columns = self
            .columns
            .into_iter()
            .map(|column| {
                column
                    .into_iter()
                    .zip(mask)
                    .filter_map(|(value, keep)| keep.then_some(value))
                    .collect()
            })
            .collect();
        Self {
            names: self.names,
            columns,
        }
    }

    /// Removes a column if present
    pub fn drop_column(&mut self, name: &str) {
        if let Some(i) = self.names.iter().position(|n| n == name) {
            self.names.remove(i);
            self.columns.remove(i);
        }
    }
}

fn is_missing(value: &Option<String>) -> bool {
    value.as_deref().map(|v| v.trim().is_empty()).unwrap_or(true)
}

fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Canonical column name: lower-case ASCII, `_` for whitespace runs
pub fn canonical_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for c in raw.trim().to_lowercase().chars().map(fold_diacritic) {
        if c.is_whitespace() {
            pending_separator = true;
            continue;
        }
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            continue;
        }
        if pending_separator && !out.is_empty() {
            out.push('_');
        }
        pending_separator = false;
        out.push(c);
    }

    if out.is_empty() {
        "unknown".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("DIAG_PRINC", "diag_princ" ; "upper case")]
    #[test_case("  Proc Rea ", "proc_rea" ; "inner whitespace")]
    #[test_case("Município  Residência", "municipio_residencia" ; "diacritics")]
    #[test_case("Ação-(R$)", "acaor" ; "punctuation dropped")]
    #[test_case("***", "unknown" ; "nothing left")]
    fn test_canonical_name(raw: &str, expected: &str) {
        assert_eq!(canonical_name(raw), expected);
    }

    #[test]
    fn test_duplicate_columns_are_coalesced() {
        let batch = RawBatch::from_rows(
            &["UF_ZI", "DIAG_PRINC", "diag princ", "ANO"],
            &[
                vec![Some("35"), None, Some("E11"), Some("2024")],
                vec![Some("35"), Some("I70"), Some("Z89"), Some("2024")],
                vec![Some("35"), Some("  "), None, Some("2024")],
            ],
        )
        .normalize_columns();

        assert_eq!(batch.names(), &["uf_zi", "diag_princ", "ano"]);
        let diag = batch.column("diag_princ").unwrap();
        assert_eq!(diag[0].as_deref(), Some("E11"));
        assert_eq!(diag[1].as_deref(), Some("I70"));
        assert_eq!(diag[2].as_deref(), Some("  "));
    }

    #[test]
    fn test_retain_rows() {
        let batch = RawBatch::from_rows(
            &["a", "b"],
            &[
                vec![Some("1"), Some("x")],
                vec![Some("2"), None],
                vec![Some("3"), Some("z")],
            ],
        )
        .retain_rows(&[true, false, true]);

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.column("a").unwrap()[1].as_deref(), Some("3"));
    }
}
