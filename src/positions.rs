// 📐 Text Position Indexer
// Buckets positioned text runs into columns (nearest center wins) and rebuilds
// visual rows so a positional page can be read as line text.
//
// Coordinates: x grows to the right, y grows downward from the top of the page.

use crate::error::{ReconError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ============================================================================
// PAGE ITEMS
// ============================================================================

/// One positioned run of text on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextItem {
    pub text: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub font_size: f64,
}

impl TextItem {
    pub fn new(text: &str, x: f64, y: f64) -> Self {
        TextItem {
            text: text.to_string(),
            x,
            y,
            font_size: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionalPage {
    pub page_width: f64,
    #[serde(default)]
    pub page_height: f64,
    pub items: Vec<TextItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnBoundary {
    pub x_start: f64,
    pub x_end: f64,
}

impl ColumnBoundary {
    pub fn new(x_start: f64, x_end: f64) -> Self {
        ColumnBoundary { x_start, x_end }
    }

    pub fn center(&self) -> f64 {
        (self.x_start + self.x_end) / 2.0
    }

    pub fn width(&self) -> f64 {
        self.x_end - self.x_start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub index: usize,
    pub boundary: ColumnBoundary,
    pub items: Vec<TextItem>,
}

/// Items sharing one visual line; `cells[i]` holds the items of column i, left to right
#[derive(Debug, Clone, PartialEq)]
pub struct PageRow {
    pub y: f64,
    pub cells: Vec<Vec<TextItem>>,
}

impl PageRow {
    pub fn cell_text(&self, index: usize) -> String {
        self.cells
            .get(index)
            .map(|cell| {
                cell.iter()
                    .map(|item| item.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }

    /// Non-empty cells joined by a single space
    pub fn text(&self) -> String {
        (0..self.cells.len())
            .map(|i| self.cell_text(i))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ============================================================================
// INDEXER
// ============================================================================

pub struct TextPositionIndexer {
    /// Max vertical distance from a row's first item to still belong to the row
    row_tolerance: f64,
    /// Horizontal gap that separates two detected columns
    min_column_gap: f64,
}

impl TextPositionIndexer {
    pub fn new() -> Self {
        TextPositionIndexer {
            row_tolerance: 3.0,
            min_column_gap: 12.0,
        }
    }

    pub fn with_tolerances(row_tolerance: f64, min_column_gap: f64) -> Self {
        TextPositionIndexer {
            row_tolerance,
            min_column_gap,
        }
    }

    /// Check every boundary lies on the page with a positive width
    pub fn validate_boundaries(boundaries: &[ColumnBoundary], page_width: f64) -> Result<()> {
        for (index, b) in boundaries.iter().enumerate() {
            let finite = b.x_start.is_finite() && b.x_end.is_finite() && page_width.is_finite();
            if !finite || page_width <= 0.0 || b.x_start < 0.0 || b.x_end > page_width || b.x_start >= b.x_end
            {
                return Err(ReconError::InvalidBoundary {
                    index,
                    x_start: b.x_start,
                    x_end: b.x_end,
                    page_width,
                });
            }
        }
        Ok(())
    }

    /// Place every item in the column whose center is nearest to its x.
    ///
    /// Equal distances go to the lowest column index. Every item lands in
    /// exactly one column.
    pub fn assign(
        &self,
        items: &[TextItem],
        boundaries: &[ColumnBoundary],
        page_width: f64,
    ) -> Result<Vec<Column>> {
        Self::validate_boundaries(boundaries, page_width)?;
        if boundaries.is_empty() && !items.is_empty() {
            return Err(ReconError::InvalidBoundary {
                index: 0,
                x_start: 0.0,
                x_end: 0.0,
                page_width,
            });
        }

        let mut columns: Vec<Column> = boundaries
            .iter()
            .enumerate()
            .map(|(index, boundary)| Column {
                index,
                boundary: *boundary,
                items: Vec::new(),
            })
            .collect();

        for item in items {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (i, column) in columns.iter().enumerate() {
                let distance = (item.x - column.boundary.center()).abs();
                if distance < best_distance {
                    best = i;
                    best_distance = distance;
                }
            }
            columns[best].items.push(item.clone());
        }

        Ok(columns)
    }

    /// Detect column boundaries by clustering item x positions.
    ///
    /// Returns None when the page does not split into exactly
    /// `expected_columns` clusters; callers fall back to configured boundaries.
    pub fn detect_boundaries(
        &self,
        items: &[TextItem],
        page_width: f64,
        expected_columns: usize,
    ) -> Option<Vec<ColumnBoundary>> {
        if expected_columns == 0 || page_width <= 0.0 {
            return None;
        }

        let mut xs: Vec<f64> = items
            .iter()
            .filter(|i| !i.text.trim().is_empty())
            .map(|i| i.x)
            .filter(|x| x.is_finite() && *x >= 0.0 && *x < page_width)
            .collect();
        if xs.is_empty() {
            return None;
        }
        xs.sort_by(|a, b| a.total_cmp(b));

        // (min, max) per cluster
        let mut clusters: Vec<(f64, f64)> = vec![(xs[0], xs[0])];
        for &x in &xs[1..] {
            let last = clusters.len() - 1;
            if x - clusters[last].1 > self.min_column_gap {
                clusters.push((x, x));
            } else {
                clusters[last].1 = x;
            }
        }

        if clusters.len() != expected_columns {
            return None;
        }

        let mut boundaries = Vec::with_capacity(clusters.len());
        let mut start = clusters[0].0;
        for window in clusters.windows(2) {
            let split = (window[0].1 + window[1].0) / 2.0;
            boundaries.push(ColumnBoundary::new(start, split));
            start = split;
        }
        let (_, last_max) = clusters[clusters.len() - 1];
        boundaries.push(ColumnBoundary::new(
            start,
            (last_max + self.min_column_gap).min(page_width),
        ));

        Self::validate_boundaries(&boundaries, page_width)
            .ok()
            .map(|_| boundaries)
    }

    /// Rebuild visual rows from assigned columns, top to bottom
    pub fn rows(&self, columns: &[Column]) -> Vec<PageRow> {
        let mut placed: Vec<(usize, &TextItem)> = columns
            .iter()
            .flat_map(|c| c.items.iter().map(move |item| (c.index, item)))
            .collect();
        placed.sort_by(|a, b| match a.1.y.total_cmp(&b.1.y) {
            Ordering::Equal => a.1.x.total_cmp(&b.1.x),
            other => other,
        });

        let mut rows: Vec<PageRow> = Vec::new();
        for (column, item) in placed {
            let starts_new_row = match rows.last() {
                Some(row) => (item.y - row.y).abs() > self.row_tolerance,
                None => true,
            };
            if starts_new_row {
                rows.push(PageRow {
                    y: item.y,
                    cells: vec![Vec::new(); columns.len()],
                });
            }
            if let Some(row) = rows.last_mut() {
                if let Some(cell) = row.cells.get_mut(column) {
                    cell.push(item.clone());
                }
            }
        }

        for row in &mut rows {
            for cell in &mut row.cells {
                cell.sort_by(|a, b| a.x.total_cmp(&b.x));
            }
        }

        rows
    }

    /// One line of text per visual row
    pub fn render(&self, columns: &[Column]) -> String {
        self.rows(columns)
            .iter()
            .map(PageRow::text)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for TextPositionIndexer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
