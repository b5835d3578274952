use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use shared::domain::FileRecord;

pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Column the collection is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    SizeBytes,
    MimeType,
    UploadedAt,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// One rendered page of the collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub items: Vec<FileRecord>,
    pub page: usize,
    pub total_pages: usize,
    pub total_matches: usize,
}

/// Interaction state for the derived view: search term, sort order and page.
/// Holds no records of its own; `project` recomputes the visible slice from
/// whatever snapshot the engine hands over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub search_term: String,
    pub sort_key: SortKey,
    pub sort_direction: SortDirection,
    pub page: usize,
    page_size: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl ViewState {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            search_term: String::new(),
            // newest uploads first, matching the table's initial ordering
            sort_key: SortKey::UploadedAt,
            sort_direction: SortDirection::Descending,
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Changing the search term jumps back to the first page so the caller
    /// is never stranded past the end of the filtered set.
    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
        self.page = 1;
    }

    /// Repeating the current key flips the direction; a new key sorts
    /// ascending.
    pub fn set_sort(&mut self, key: SortKey) {
        if key == self.sort_key {
            self.sort_direction = self.sort_direction.toggled();
        } else {
            self.sort_key = key;
            self.sort_direction = SortDirection::Ascending;
        }
    }

    /// Out-of-range requests are no-ops.
    pub fn set_page(&mut self, page: usize, total_pages: usize) {
        if (1..=total_pages).contains(&page) {
            self.page = page;
        }
    }

    pub fn next_page(&mut self, total_pages: usize) {
        self.set_page(self.page + 1, total_pages);
    }

    pub fn prev_page(&mut self) {
        if self.page > 1 {
            self.page -= 1;
        }
    }

    /// Computes the visible slice: stable sort, then case-insensitive
    /// substring filter on the name, then pagination. The page is clamped
    /// into `[1, total_pages]` before slicing.
    pub fn project(&self, records: &[FileRecord]) -> Projection {
        let mut sorted: Vec<FileRecord> = records.to_vec();
        sorted.sort_by(|a, b| {
            let ordering = compare_by_key(a, b, self.sort_key);
            match self.sort_direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });

        let needle = self.search_term.to_lowercase();
        let filtered: Vec<FileRecord> = sorted
            .into_iter()
            .filter(|record| record.name.to_lowercase().contains(&needle))
            .collect();

        let total_matches = filtered.len();
        let total_pages = total_matches.div_ceil(self.page_size).max(1);
        let page = self.page.clamp(1, total_pages);
        let items = filtered
            .into_iter()
            .skip((page - 1) * self.page_size)
            .take(self.page_size)
            .collect();

        Projection {
            items,
            page,
            total_pages,
            total_matches,
        }
    }
}

fn compare_by_key(a: &FileRecord, b: &FileRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.cmp(&b.name),
        SortKey::SizeBytes => a.size_bytes.cmp(&b.size_bytes),
        SortKey::MimeType => a.mime_type.cmp(&b.mime_type),
        SortKey::UploadedAt => a.uploaded_at.cmp(&b.uploaded_at),
        SortKey::Status => a.status.cmp(&b.status),
    }
}

/// Human-readable byte count, powers of 1024, at most two decimals
/// ("0 Bytes", "1.5 KB", "2.25 MB").
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let mut text = format!("{value:.2}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    format!("{text} {}", UNITS[exponent])
}
