use scraper::ElementRef;

/// Upper bound on `colspan`, so a hostile page can't blow up a row.
const MAX_COLSPAN: usize = 64;

/// An HTML table read into text cells. Blank cells are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl HtmlTable {
    /// Read headers and body rows from a `<table>` element.
    ///
    /// The first row made only of `<th>` cells is the header. `colspan`
    /// repeats the cell's text; short rows are padded with blanks.
    pub fn read(table: ElementRef<'_>) -> Self {
        let mut headers: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<Option<String>>> = Vec::new();

        for tr in own_rows(table) {
            let cells: Vec<ElementRef<'_>> = tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "th" | "td"))
                .collect();
            if cells.is_empty() {
                continue;
            }

            let all_th = cells.iter().all(|c| c.value().name() == "th");
            let mut expanded = Vec::with_capacity(cells.len());
            for cell in &cells {
                let span = cell
                    .value()
                    .attr("colspan")
                    .and_then(|s| s.trim().parse::<usize>().ok())
                    .unwrap_or(1)
                    .clamp(1, MAX_COLSPAN);
                let text = cell_text(cell);
                for _ in 0..span {
                    expanded.push(text.clone());
                }
            }

            if all_th && headers.is_empty() && rows.is_empty() {
                headers = expanded.into_iter().map(Option::unwrap_or_default).collect();
            } else {
                rows.push(expanded);
            }
        }

        let width = rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(headers.len()))
            .max()
            .unwrap_or(0);
        headers.resize(width, String::new());
        for row in &mut rows {
            row.resize(width, None);
        }

        HtmlTable { headers, rows }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn drop_column(&mut self, idx: usize) {
        if idx >= self.width() {
            return;
        }
        self.headers.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }
}

/// The table's own `<tr>` elements, skipping rows of nested tables.
fn own_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|r| r.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

fn cell_text(cell: &ElementRef<'_>) -> Option<String> {
    let text = cell
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
