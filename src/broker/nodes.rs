// ABOUTME: Node catalog parsing for `tsh ls --format=names`
// ABOUTME: Keeps the broker's ordering and treats an empty listing as a normal result

/// One node name per line; blank lines are skipped and order is preserved.
pub fn parse_nodes(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
