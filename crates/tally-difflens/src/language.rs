//! Language inference for changed files.
//!
//! Classification runs in tiers, first match wins:
//! 1. vendored libraries and `LICENSE` are excluded,
//! 2. the ordered [`PATH_RULES`] table is checked against the path,
//! 3. the first line of the file content at the revision is sniffed,
//! 4. the text after the last `.` of the path becomes the label.

use tally_core::{ContentSource, Language};

/// How a [`PathRule`] inspects the path.
#[derive(Clone, Copy)]
pub enum PathMatcher {
    /// The text after the last `.` is one of the listed extensions.
    Extension {
        extensions: &'static [&'static str],
        ignore_case: bool,
    },
    /// The path ends with one of the listed strings.
    Suffix(&'static [&'static str]),
    /// The last path component is one of the listed names.
    FileName(&'static [&'static str]),
    /// The whole path equals the given string.
    Exact(&'static str),
    /// Matcher that does not fit the other shapes.
    Custom(fn(&str) -> bool),
}

impl PathMatcher {
    /// Whether `path` satisfies this matcher.
    pub fn matches(&self, path: &str) -> bool {
        match *self {
            PathMatcher::Extension {
                extensions,
                ignore_case,
            } => match path.rsplit_once('.') {
                Some((_, ext)) if ignore_case => {
                    extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
                }
                Some((_, ext)) => extensions.contains(&ext),
                None => false,
            },
            PathMatcher::Suffix(suffixes) => suffixes.iter().any(|s| path.ends_with(s)),
            PathMatcher::FileName(names) => names.contains(&file_name(path)),
            PathMatcher::Exact(expected) => path == expected,
            PathMatcher::Custom(matcher) => matcher(path),
        }
    }
}

/// What a matching [`PathRule`] decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Count the file under this language label.
    Label(&'static str),
    /// Do not count the file at all.
    Exclude,
}

impl Verdict {
    fn into_language(self) -> Language {
        match self {
            Verdict::Label(label) => Language::labeled(label),
            Verdict::Exclude => Language::Excluded,
        }
    }
}

/// One row of the path classification table.
#[derive(Clone, Copy)]
pub struct PathRule {
    pub matcher: PathMatcher,
    pub verdict: Verdict,
}

const fn ext(extensions: &'static [&'static str], label: &'static str) -> PathRule {
    PathRule {
        matcher: PathMatcher::Extension {
            extensions,
            ignore_case: false,
        },
        verdict: Verdict::Label(label),
    }
}

const fn ext_any_case(extensions: &'static [&'static str], label: &'static str) -> PathRule {
    PathRule {
        matcher: PathMatcher::Extension {
            extensions,
            ignore_case: true,
        },
        verdict: Verdict::Label(label),
    }
}

const fn rule(matcher: PathMatcher, verdict: Verdict) -> PathRule {
    PathRule { matcher, verdict }
}

/// Ordered path rules, checked top to bottom. Order matters: `bash_ini`
/// is INI rather than bash, and `LICENSE-txt` is Text rather than excluded.
pub const PATH_RULES: &[PathRule] = &[
    ext_any_case(&["xml"], "XML"),
    ext_any_case(&["go"], "Golang"),
    ext_any_case(&["pl", "pm", "t", "cgi", "pod", "run"], "Perl"),
    ext(&["rb", "gemspec"], "Ruby"),
    rule(PathMatcher::FileName(&["Rakefile"]), Verdict::Label("Ruby")),
    ext(&["md"], "Markdown"),
    ext(&["json"], "JSON"),
    ext(&["yml", "yaml"], "YAML"),
    rule(
        PathMatcher::Suffix(&[
            "perlcriticrc",
            "githooksrc",
            "ini",
            "editorconfig",
            "gitconfig",
        ]),
        Verdict::Label("INI"),
    ),
    ext(&["css"], "CSS"),
    ext(&["tt2", "html"], "HTML"),
    ext(&["sql"], "SQL"),
    ext(&["py"], "Python"),
    ext(&["js"], "JavaScript"),
    ext(&["c"], "C"),
    ext(&["sh"], "bash"),
    rule(PathMatcher::Custom(is_bash_dotfile), Verdict::Label("bash")),
    rule(
        PathMatcher::Suffix(&[
            "SKIP",
            "gitignore",
            "txt",
            "csv",
            "vim",
            "gitmodules",
            "gitattributes",
            "jshintrc",
            "gperf",
            "vimrc",
            "psqlrc",
            "inputrc",
            "screenrc",
            "curlrc",
            "wgetrc",
            "selected_editor",
            "dmrc",
            "netrc",
        ]),
        Verdict::Label("Text"),
    ),
    rule(PathMatcher::Custom(is_license), Verdict::Exclude),
    rule(
        PathMatcher::Extension {
            extensions: &["0", "1", "VimballRecord"],
            ignore_case: false,
        },
        Verdict::Exclude,
    ),
    rule(PathMatcher::Exact("vim/doc/tags"), Verdict::Exclude),
    rule(
        PathMatcher::FileName(&[
            "README",
            "MANIFEST",
            "Changes",
            "Gemfile",
            "Gemfile.lock",
            "CHANGELOG",
        ]),
        Verdict::Label("Text"),
    ),
];

/// Vendored files matched by a plain path suffix.
const LIBRARY_SUFFIXES: &[&str] = &[
    "jquery.datepick.js",
    "jquery.datepick.min.js",
    "chart.min.js",
    "jquery.js",
    "jquery-loader.js",
    "qunit.js",
    "d3.v3.js",
    "d3.v3.min.js",
    "automysqlbackup",
    "automysqlbackup_default.conf",
];

/// Whether `path` is a well-known third-party library or tool config that
/// should never count towards an author's contributions.
///
/// # Examples
///
/// ```
/// use tally_difflens::language::is_library;
///
/// assert!(is_library("static/js/jquery-1.11.3.min.js"));
/// assert!(is_library("js/jquery-ui-1.10.4.custom.js"));
/// assert!(!is_library("js/app.js"));
/// ```
pub fn is_library(path: &str) -> bool {
    if LIBRARY_SUFFIXES.iter().any(|suffix| path.ends_with(suffix)) {
        return true;
    }

    for tail in [".custom.js", ".custom.min.js"] {
        if let Some(stem) = path.strip_suffix(tail) {
            if ends_with_versioned(stem, "jquery-ui-") {
                return true;
            }
        }
    }

    for tail in [".js", ".min.js"] {
        if let Some(stem) = path.strip_suffix(tail) {
            if ends_with_versioned(stem, "jquery-") {
                return true;
            }
        }
    }

    false
}

/// Whether `text` ends with `prefix` followed by a `X.Y.Z` numeric version.
fn ends_with_versioned(text: &str, prefix: &str) -> bool {
    let mut rest = text;
    for i in 0..3 {
        let digits = rest.len() - rest.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return false;
        }
        rest = &rest[..rest.len() - digits];
        if i < 2 {
            match rest.strip_suffix('.') {
                Some(stripped) => rest = stripped,
                None => return false,
            }
        }
    }
    rest.ends_with(prefix)
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_word(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// `bash`, `.bashrc`-style names: ends in `bash` or `bash_<word>`.
fn is_bash_dotfile(path: &str) -> bool {
    path.ends_with("bash")
        || path
            .match_indices("bash_")
            .any(|(idx, m)| is_word(&path[idx + m.len()..]))
}

/// `LICENSE` or `LICENSE-<word>` as the last path component.
fn is_license(path: &str) -> bool {
    let name = file_name(path);
    name == "LICENSE" || name.strip_prefix("LICENSE-").is_some_and(is_word)
}

/// Classify using the path alone (tiers 1 and 2).
///
/// Returns `None` when no rule applies and the content has to be sniffed.
///
/// # Examples
///
/// ```
/// use tally_core::Language;
/// use tally_difflens::language::classify_path;
///
/// assert_eq!(classify_path("cmd/main.go"), Some(Language::labeled("Golang")));
/// assert_eq!(classify_path("js/jquery.js"), Some(Language::Excluded));
/// assert_eq!(classify_path("bin/tool"), None);
/// ```
pub fn classify_path(path: &str) -> Option<Language> {
    if path == "LICENSE" || is_library(path) {
        return Some(Language::Excluded);
    }

    PATH_RULES
        .iter()
        .find(|rule| rule.matcher.matches(path))
        .map(|rule| rule.verdict.into_language())
}

/// Infer a language from the first line of a file (tier 3).
///
/// # Examples
///
/// ```
/// use tally_core::Language;
/// use tally_difflens::language::sniff_content;
///
/// assert_eq!(sniff_content("#!/usr/bin/perl\nuse strict;\n"), Some(Language::labeled("Perl")));
/// assert_eq!(sniff_content("plain text"), None);
/// ```
pub fn sniff_content(content: &str) -> Option<Language> {
    let first_line = content.split('\n').next().unwrap_or("");

    if first_line.ends_with("perl") {
        return Some(Language::labeled("Perl"));
    }
    if first_line.ends_with("ruby") {
        return Some(Language::labeled("Ruby"));
    }
    // Known quirk: bash shebangs have always been tallied as Ruby. Kept so
    // historical reports stay comparable.
    if first_line == "#!/usr/bin/bash" {
        return Some(Language::labeled("Ruby"));
    }

    None
}

/// Label a file by the text after its last `.` (tier 4).
///
/// Paths without an extension are labeled with the whole path; `lock`
/// files are excluded.
pub fn extension_fallback(path: &str) -> Language {
    match path.rsplit_once('.') {
        Some((_, "lock")) => Language::Excluded,
        Some((_, ext)) if !ext.is_empty() => Language::labeled(ext),
        _ => Language::labeled(path),
    }
}

/// Determine the language of `path` as of `revision`.
///
/// Content is only fetched from `source` when no path rule applies. A
/// failed fetch is logged and yields [`Language::Unknown`]; it never
/// aborts the analysis.
///
/// # Examples
///
/// ```
/// use tally_core::{ContentSource, Language, TallyError};
/// use tally_difflens::language::classify;
///
/// struct Script;
///
/// impl ContentSource for Script {
///     fn read_blob(&self, _revision: &str, _path: &str) -> Result<String, TallyError> {
///         Ok("#!/usr/bin/env ruby\nputs 1\n".into())
///     }
/// }
///
/// assert_eq!(classify("bin/deploy", "abc123", &Script), Language::labeled("Ruby"));
/// assert_eq!(classify("lib/app.py", "abc123", &Script), Language::labeled("Python"));
/// ```
pub fn classify<S>(path: &str, revision: &str, source: &S) -> Language
where
    S: ContentSource + ?Sized,
{
    if let Some(language) = classify_path(path) {
        return language;
    }

    let content = match source.read_blob(revision, path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path, revision, error = %e, "failed to read file content");
            return Language::Unknown;
        }
    };
    if content.is_empty() {
        return Language::Unknown;
    }

    sniff_content(&content).unwrap_or_else(|| extension_fallback(path))
}
