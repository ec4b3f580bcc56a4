/// Finds the dataset column a user-typed dimension name refers to.
///
/// Matching is case-insensitive and exact; the first column in schema order
/// wins when several columns fold to the same name.
pub fn resolve_column<'a, S: AsRef<str>>(input: &str, columns: &'a [S]) -> Option<&'a str> {
    let wanted = input.to_lowercase();
    columns
        .iter()
        .map(AsRef::as_ref)
        .find(|col| col.to_lowercase() == wanted)
}
