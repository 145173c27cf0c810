/// A CSV document built row by row. Every field is quoted, embedded quotes
/// are doubled, and rows are joined with `\n`.
#[derive(Debug, Default, Clone)]
pub struct CsvTable {
    rows: Vec<String>,
}

impl CsvTable {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = CsvTable::default();
        table.push_row(headers);
        table
    }

    pub fn push_row<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let row = fields
            .into_iter()
            .map(|f| quote(f.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        self.rows.push(row);
    }

    /// Data rows, not counting the header.
    pub fn len(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finish(self) -> String {
        self.rows.join("\n")
    }
}

pub fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
