//! Added/deleted line counting over hunk bodies.

use tally_core::LineCounts;

/// Count added and deleted lines in a hunk body.
///
/// Lines starting with `+` count as added and lines starting with `-` as
/// deleted, unless everything after the sign is whitespace. A bare `+` or
/// `-` (an empty line) still counts. Context lines are ignored. The body
/// must not contain the `---`/`+++` file headers; [`FileDiff::body`]
/// already strips them.
///
/// [`FileDiff::body`]: crate::parser::FileDiff::body
///
/// # Examples
///
/// ```
/// use tally_difflens::lines::count_lines;
///
/// let counts = count_lines("+x\n+   \n-y\n unchanged\n");
/// assert_eq!(counts.added, 1);
/// assert_eq!(counts.deleted, 1);
/// ```
pub fn count_lines(body: &str) -> LineCounts {
    let mut counts = LineCounts::default();

    for line in body.split('\n') {
        if let Some(rest) = line.strip_prefix('+') {
            if !is_whitespace_only(rest) {
                counts.added += 1;
            }
        } else if let Some(rest) = line.strip_prefix('-') {
            if !is_whitespace_only(rest) {
                counts.deleted += 1;
            }
        }
    }

    counts
}

fn is_whitespace_only(rest: &str) -> bool {
    !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_whitespace() || b == 0x0b)
}
