/// Normalize a raw cell for output: empty and missing cells both become `None`.
pub fn present(cell: Option<&str>) -> Option<&str> {
    cell.filter(|s| !s.is_empty())
}

/// Trim a present cell for comparison or distinct-value collection.
/// Whitespace-only cells yield `None`.
pub fn clean_cell(cell: Option<&str>) -> Option<&str> {
    present(cell).map(str::trim).filter(|s| !s.is_empty())
}
