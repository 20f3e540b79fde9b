use tally_core::{Result, TallyError};

/// A complete diff for a single file, containing one or more hunks.
///
/// # Examples
///
/// ```
/// use tally_difflens::parser::parse_unified_diff;
///
/// let diff = concat!(
///     "diff --git a/hello.py b/hello.py\n",
///     "--- a/hello.py\n",
///     "+++ b/hello.py\n",
///     "@@ -1,2 +1,3 @@\n",
///     " def main():\n",
///     "+    print(\"hello\")\n",
///     "     pass\n",
/// );
/// let files = parse_unified_diff(diff).unwrap();
/// assert_eq!(files.len(), 1);
/// assert_eq!(files[0].path(), "hello.py");
/// assert_eq!(files[0].hunks.len(), 1);
/// assert_eq!(files[0].body().lines().count(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileDiff {
    /// Path in the old version (`/dev/null` for new files).
    pub old_path: String,
    /// Path in the new version (`/dev/null` for deleted files).
    pub new_path: String,
    /// Parsed hunks for this file.
    pub hunks: Vec<DiffHunk>,
    /// Whether this file was deleted.
    pub is_deleted_file: bool,
}

impl FileDiff {
    /// Repository-relative path the change applies to.
    ///
    /// The old path is used for deletions since the new side is `/dev/null`.
    pub fn path(&self) -> &str {
        if self.is_deleted_file {
            &self.old_path
        } else {
            &self.new_path
        }
    }

    /// Hunk lines of every hunk, without file or hunk headers.
    pub fn body(&self) -> String {
        let mut body = String::new();
        for hunk in &self.hunks {
            body.push_str(&hunk.content);
        }
        body
    }
}

/// A single hunk from a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    /// `+`, `-` and context lines, newline terminated.
    pub content: String,
}

/// Hunk being filled, with the number of old/new lines still expected.
struct OpenHunk {
    hunk: DiffHunk,
    old_remaining: u32,
    new_remaining: u32,
}

impl OpenHunk {
    fn is_exhausted(&self) -> bool {
        self.old_remaining == 0 && self.new_remaining == 0
    }
}

/// Parse a unified diff (as produced by `git show` or `git diff`) into
/// structured [`FileDiff`] entries.
///
/// Handles new, deleted and renamed files, quoted paths and patches without
/// a `diff --git` line. Binary files are skipped. Lines inside a hunk are
/// consumed according to the hunk header's line counts, so a removed line
/// such as `--- comment` is never mistaken for a file header.
///
/// # Errors
///
/// Returns [`TallyError::Parse`] if a hunk header is malformed.
///
/// # Examples
///
/// ```
/// use tally_difflens::parser::parse_unified_diff;
///
/// let files = parse_unified_diff("").unwrap();
/// assert!(files.is_empty());
/// ```
pub fn parse_unified_diff(input: &str) -> Result<Vec<FileDiff>> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current: Option<FileDiff> = None;
    let mut open: Option<OpenHunk> = None;
    let mut is_binary = false;

    // `lines()` would drop the `\r` of CRLF content, which must survive
    // for whitespace-only detection.
    for line in input.split_terminator('\n') {
        if let Some(hunk) = open.as_mut() {
            if consume_hunk_line(hunk, line) {
                if hunk.is_exhausted() {
                    flush_hunk(&mut current, &mut open);
                }
                continue;
            }
            // The hunk ended early; treat the line as a header.
            flush_hunk(&mut current, &mut open);
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            finish_file(&mut files, &mut current, is_binary);
            is_binary = false;
            let mut file = FileDiff::default();
            if let Some((old, new)) = split_git_header(rest) {
                file.old_path = old;
                file.new_path = new;
            }
            current = Some(file);
            continue;
        }

        // Standard patches may lack the "diff --git" line.
        if line.starts_with("--- ") && current.is_none() {
            current = Some(FileDiff::default());
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if line.starts_with("Binary files ") && line.ends_with(" differ") {
            is_binary = true;
            continue;
        }

        if line.starts_with("deleted file mode") {
            file.is_deleted_file = true;
            continue;
        }

        if let Some(path) = line.strip_prefix("rename from ") {
            file.old_path = parse_path(path);
            continue;
        }

        if let Some(path) = line.strip_prefix("rename to ") {
            file.new_path = parse_path(path);
            continue;
        }

        if let Some(path) = line.strip_prefix("--- ") {
            file.old_path = parse_path(path);
            continue;
        }

        if let Some(path) = line.strip_prefix("+++ ") {
            file.new_path = parse_path(path);
            if file.new_path == "/dev/null" {
                file.is_deleted_file = true;
            }
            continue;
        }

        if line.starts_with("@@ ") {
            let (old_lines, new_lines) = parse_hunk_header(line)?;
            let hunk = OpenHunk {
                hunk: DiffHunk {
                    content: String::new(),
                },
                old_remaining: old_lines,
                new_remaining: new_lines,
            };
            if hunk.is_exhausted() {
                file.hunks.push(hunk.hunk);
            } else {
                open = Some(hunk);
            }
        }

        // Everything else ("index", "similarity index", mode lines,
        // "\ No newline at end of file") carries no line counts.
    }

    flush_hunk(&mut current, &mut open);
    finish_file(&mut files, &mut current, is_binary);

    Ok(files)
}

/// Append `line` to the open hunk if it belongs there.
fn consume_hunk_line(open: &mut OpenHunk, line: &str) -> bool {
    if line.starts_with('\\') {
        return true;
    }

    match line.chars().next() {
        Some('+') if open.new_remaining > 0 => open.new_remaining -= 1,
        Some('-') if open.old_remaining > 0 => open.old_remaining -= 1,
        // Some tools strip the single space of empty context lines.
        Some(' ') | None if open.old_remaining > 0 && open.new_remaining > 0 => {
            open.old_remaining -= 1;
            open.new_remaining -= 1;
        }
        _ => return false,
    }

    open.hunk.content.push_str(line);
    open.hunk.content.push('\n');
    true
}

fn flush_hunk(current: &mut Option<FileDiff>, open: &mut Option<OpenHunk>) {
    if let Some(h) = open.take() {
        if let Some(file) = current.as_mut() {
            file.hunks.push(h.hunk);
        }
    }
}

fn finish_file(files: &mut Vec<FileDiff>, current: &mut Option<FileDiff>, is_binary: bool) {
    if let Some(file) = current.take() {
        if !is_binary {
            files.push(file);
        }
    }
}

/// Split the `a/<old> b/<new>` part of a `diff --git` line.
fn split_git_header(rest: &str) -> Option<(String, String)> {
    let rest = rest.trim_end();
    if rest.starts_with('"') {
        let (old, tail) = take_quoted(rest)?;
        return Some((strip_side(old), parse_path(tail.trim_start())));
    }

    // Both sides name the same path unless the file was renamed, and then
    // the header is "a/<p> b/<p>" with the separating space in the middle.
    let mid = rest.len() / 2;
    if rest.len() % 2 == 1 && rest.as_bytes().get(mid) == Some(&b' ') {
        if let (Some(old), Some(new)) = (rest.get(..mid), rest.get(mid + 1..)) {
            let old_rel = old.strip_prefix("a/");
            if old_rel.is_some() && old_rel == new.strip_prefix("b/") {
                return Some((parse_path(old), parse_path(new)));
            }
        }
    }

    let idx = rest.find(" b/")?;
    Some((parse_path(&rest[..idx]), parse_path(&rest[idx + 1..])))
}

/// Path from a `---`/`+++`/`rename` line or one side of a git header.
fn parse_path(raw: &str) -> String {
    let raw = raw.trim_end_matches('\t');
    let path = match take_quoted(raw) {
        Some((path, _)) => path,
        None => raw.to_string(),
    };
    strip_side(path)
}

fn strip_side(path: String) -> String {
    if path == "/dev/null" {
        return path;
    }
    let stripped = path
        .strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .map(str::to_string);
    stripped.unwrap_or(path)
}

/// Decode a leading double-quoted path and return it with the rest of the
/// input. Git quotes paths holding control or non-ASCII bytes and writes
/// those bytes as C escapes, with three octal digits per byte.
fn take_quoted(input: &str) -> Option<(String, &str)> {
    let raw = input.strip_prefix('"')?.as_bytes();
    let mut decoded = Vec::with_capacity(raw.len());
    let mut i = 0;
    loop {
        let byte = *raw.get(i)?;
        i += 1;
        match byte {
            b'"' => break,
            b'\\' => {
                let escape = *raw.get(i)?;
                i += 1;
                let value = match escape {
                    b'0'..=b'7' => {
                        let mut value = u32::from(escape - b'0');
                        for _ in 0..2 {
                            match raw.get(i).copied() {
                                Some(digit @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(digit - b'0');
                                    i += 1;
                                }
                                _ => break,
                            }
                        }
                        u8::try_from(value).unwrap_or(u8::MAX)
                    }
                    b'a' => 0x07,
                    b'b' => 0x08,
                    b'f' => 0x0c,
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'v' => 0x0b,
                    other => other,
                };
                decoded.push(value);
            }
            other => decoded.push(other),
        }
    }
    // `i` sits just past the closing quote, an ASCII byte.
    let rest = &input[i + 1..];
    Some((String::from_utf8_lossy(&decoded).into_owned(), rest))
}

/// Old and new line counts of a `@@ -a,b +c,d @@` header.
fn parse_hunk_header(line: &str) -> Result<(u32, u32)> {
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| {
            let end = s.find(" @@")?;
            Some(&s[..end])
        })
        .ok_or_else(|| TallyError::Parse(format!("invalid hunk header: {line}")))?;

    let parts: Vec<&str> = inner.split(' ').collect();
    if parts.len() != 2 {
        return Err(TallyError::Parse(format!("invalid hunk header: {line}")));
    }

    let old = parts[0]
        .strip_prefix('-')
        .ok_or_else(|| TallyError::Parse(format!("invalid old range in hunk: {line}")))?;
    let new = parts[1]
        .strip_prefix('+')
        .ok_or_else(|| TallyError::Parse(format!("invalid new range in hunk: {line}")))?;

    let (_, old_lines) = parse_range(old, line)?;
    let (_, new_lines) = parse_range(new, line)?;

    Ok((old_lines, new_lines))
}

fn parse_range(range: &str, context: &str) -> Result<(u32, u32)> {
    if let Some((start, count)) = range.split_once(',') {
        let s = start
            .parse()
            .map_err(|_| TallyError::Parse(format!("invalid range number in: {context}")))?;
        let c = count
            .parse()
            .map_err(|_| TallyError::Parse(format!("invalid range count in: {context}")))?;
        Ok((s, c))
    } else {
        let s = range
            .parse()
            .map_err(|_| TallyError::Parse(format!("invalid range number in: {context}")))?;
        Ok((s, 1))
    }
}
