use crate::cli::style::UiStyle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct TableColumn {
    pub header: String,
    pub align: Align,
}

impl TableColumn {
    pub fn left(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            align: Align::Left,
        }
    }

    pub fn right(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            align: Align::Right,
        }
    }
}

/// Read-only report table. Column widths follow the widest cell.
#[derive(Debug, Clone)]
pub struct Table {
    pub title: Option<String>,
    pub columns: Vec<TableColumn>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<T: Into<String>>(title: Option<T>, columns: Vec<TableColumn>) -> Self {
        Self {
            title: title.map(Into::into),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn add_row<S: Into<String>>(&mut self, cells: Vec<S>) {
        self.rows
            .push(cells.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct TableRenderer;

impl TableRenderer {
    pub fn render(table: &Table, style: &UiStyle) -> String {
        let widths: Vec<usize> = table
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                table
                    .rows
                    .iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(column.header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();
        let total_width = widths.iter().map(|w| w + 2).sum::<usize>();

        let mut lines = Vec::new();
        if let Some(title) = &table.title {
            lines.push(style.format_header(title));
        }
        let headers: Vec<&str> = table.columns.iter().map(|c| c.header.as_str()).collect();
        lines.push(style.apply_header_style(&Self::line(&table.columns, &widths, &headers)));
        lines.push(style.horizontal_line(total_width));
        for row in &table.rows {
            let cells: Vec<&str> = (0..table.columns.len())
                .map(|idx| row.get(idx).map(String::as_str).unwrap_or(""))
                .collect();
            lines.push(Self::line(&table.columns, &widths, &cells));
        }
        lines.join("\n")
    }

    fn line(columns: &[TableColumn], widths: &[usize], cells: &[&str]) -> String {
        let padded: Vec<String> = columns
            .iter()
            .zip(widths)
            .zip(cells)
            .map(|((column, width), cell)| match column.align {
                Align::Left => format!("{cell:<width$}"),
                Align::Right => format!("{cell:>width$}"),
            })
            .collect();
        padded.join("  ").trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_widen_to_fit_cells() {
        let mut table = Table::new(
            Some("Spend"),
            vec![TableColumn::left("Name"), TableColumn::right("Amount")],
        );
        table.add_row(vec!["Spring sale", "12.5"]);
        table.add_row(vec!["Q4", "1200.0000"]);

        let rendered = TableRenderer::render(&table, &UiStyle::plain());
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "> Spend");
        assert_eq!(lines[1], "Name            Amount");
        assert_eq!(lines[3], "Spring sale       12.5");
        assert_eq!(lines[4], "Q4           1200.0000");
    }
}
