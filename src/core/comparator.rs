/// Compares outputs ignoring leading and trailing whitespace only.
/// Missing output compares as the empty string.
pub fn compare(expected: &str, actual: Option<&str>) -> bool {
    expected.trim() == actual.unwrap_or_default().trim()
}
