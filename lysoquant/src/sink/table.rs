/// One table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
}

impl Cell {
    fn render(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Int(value) => value.to_string(),
            Cell::Float(value) if value.is_nan() => "NaN".to_string(),
            Cell::Float(value) => format!("{:.3}", value),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Int(value as i64)
    }
}

impl From<u16> for Cell {
    fn from(value: u16) -> Self {
        Cell::Int(value as i64)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Comma,
    Tab,
}

/// Rows of named cells; the column set is the union of every column ever set,
/// in first-use order.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<(usize, Cell)>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn add_row(&mut self) {
        self.rows.push(Vec::new());
    }

    /// Sets a value in the last row, adding the column on first use.
    pub fn set(&mut self, column: &str, value: impl Into<Cell>) {
        let idx = match self.columns.iter().position(|c| c == column) {
            Some(idx) => idx,
            None => {
                self.columns.push(column.to_string());
                self.columns.len() - 1
            }
        };
        if self.rows.is_empty() {
            self.rows.push(Vec::new());
        }
        if let Some(row) = self.rows.last_mut() {
            row.retain(|(col, _)| *col != idx);
            row.push((idx, value.into()));
        }
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows
            .get(row)?
            .iter()
            .find(|(col, _)| *col == idx)
            .map(|(_, cell)| cell)
    }

    /// Delimited text with a header line; missing cells are empty.
    pub fn render(&self, delimiter: Delimiter) -> String {
        let sep = match delimiter {
            Delimiter::Comma => ",",
            Delimiter::Tab => "\t",
        };
        let field = |text: &str| match delimiter {
            Delimiter::Comma => quote_csv(text),
            Delimiter::Tab => text.replace(['\t', '\n'], " "),
        };

        let mut out = String::new();
        let header: Vec<String> = self.columns.iter().map(|c| field(c)).collect();
        out.push_str(&header.join(sep));
        out.push('\n');

        for row in &self.rows {
            let mut cells = vec![String::new(); self.columns.len()];
            for (idx, cell) in row {
                cells[*idx] = field(&cell.render());
            }
            out.push_str(&cells.join(sep));
            out.push('\n');
        }
        out
    }
}

fn quote_csv(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}
