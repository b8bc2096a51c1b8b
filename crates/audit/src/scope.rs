//! Path heuristics: scope membership, textness, dedupe eligibility markers and
//! scoring bonuses. Everything here is a pure function of the corpus-relative path.

use crate::model::ScopeClass;

/// Scope class for a corpus-relative path. Case-sensitive and prefix-exact.
#[must_use]
pub fn classify(source_path: &str) -> ScopeClass {
    if CORE_SCOPE_EXACT.contains(&source_path) {
        return ScopeClass::Core;
    }
    if CORE_SCOPE_PREFIXES
        .iter()
        .any(|prefix| source_path.starts_with(prefix))
    {
        return ScopeClass::Core;
    }
    ScopeClass::Extended
}

/// Lower-cased final suffix including the dot, or empty when there is none.
///
/// Dotfiles such as `.env` have no suffix.
#[must_use]
pub fn extension_of(source_path: &str) -> String {
    let name = source_path.rsplit('/').next().unwrap_or(source_path);
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => name[idx..].to_lowercase(),
        _ => String::new(),
    }
}

#[must_use]
pub fn is_text_extension(extension: &str) -> bool {
    TEXT_EXTENSIONS.contains(&extension)
}

/// True when the path sits under one of the canonical corpus directories that are
/// worth hashing even without a priority weight.
#[must_use]
pub fn has_dedupe_marker(source_path: &str) -> bool {
    let lowered = source_path.to_lowercase();
    DEDUPE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Number of distinct canonical-location markers the path carries.
#[must_use]
pub fn canonical_bonus_markers(source_path: &str) -> usize {
    let lowered = source_path.to_lowercase();
    CANONICAL_BONUS_MARKERS
        .iter()
        .filter(|marker| lowered.contains(*marker))
        .count()
}

const CORE_SCOPE_EXACT: &[&str] = &[
    "MAROON.md",
    "NANA_BANANA_SPEC.md",
    "conversations.json",
    "chat.html",
    "Maroon_Discovery.txt",
];

const CORE_SCOPE_PREFIXES: &[&str] = &[
    "Maroon-Core/google_free_tier/workspace/Maroon/",
    "Maroon-Core/google_free_tier/scripts/",
    "Maroon-Core/google_free_tier/sql/",
    "Maroon-Core/google_free_tier/firebase/functions/src/",
    "MaroonCLI/",
];

const DEDUPE_MARKERS: &[&str] = &[
    "/maroon-core/google_free_tier/workspace/maroon/",
    "/maroon-core/google_free_tier/sql/",
    "/maroon-core/google_free_tier/scripts/",
];

const CANONICAL_BONUS_MARKERS: &[&str] =
    &["/workspace/maroon/canonical/", "/reports/operating_registers/"];

const TEXT_EXTENSIONS: &[&str] = &[
    // Docs
    ".md",
    ".txt",
    ".rst",
    // Data
    ".json",
    ".jsonl",
    ".csv",
    ".tsv",
    ".xml",
    ".sql",
    // Code
    ".py",
    ".js",
    ".ts",
    ".tsx",
    ".jsx",
    ".html",
    // Config
    ".yaml",
    ".yml",
    ".toml",
    ".ini",
    ".cfg",
    ".conf",
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exact_names_are_core() {
        assert_eq!(classify("MAROON.md"), ScopeClass::Core);
        assert_eq!(classify("conversations.json"), ScopeClass::Core);
        assert_eq!(classify("nested/MAROON.md"), ScopeClass::Extended);
    }

    #[test]
    fn prefixes_are_core_and_case_sensitive() {
        assert_eq!(
            classify("Maroon-Core/google_free_tier/sql/views.sql"),
            ScopeClass::Core
        );
        assert_eq!(classify("MaroonCLI/src/main.py"), ScopeClass::Core);
        assert_eq!(
            classify("maroon-core/google_free_tier/sql/views.sql"),
            ScopeClass::Extended
        );
        assert_eq!(classify("MaroonCLI"), ScopeClass::Extended);
        assert_eq!(
            classify("Maroon-Core\\google_free_tier\\sql\\views.sql"),
            ScopeClass::Extended
        );
    }

    #[test]
    fn extension_is_lowercased_last_suffix() {
        assert_eq!(extension_of("docs/README.MD"), ".md");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("Makefile"), "");
        assert_eq!(extension_of("config/.env"), "");
        assert_eq!(extension_of("dir.d/file"), "");
        assert_eq!(extension_of("trailing."), "");
    }

    #[test]
    fn text_allow_list() {
        assert!(is_text_extension(".md"));
        assert!(is_text_extension(".jsonl"));
        assert!(!is_text_extension(".pdf"));
        assert!(!is_text_extension(".rs"));
        assert!(!is_text_extension(""));
    }

    #[test]
    fn dedupe_markers_match_case_insensitively() {
        assert!(has_dedupe_marker(
            "root/Maroon-Core/google_free_tier/SQL/views.sql"
        ));
        assert!(!has_dedupe_marker("Maroon-Core/google_free_tier/sql/views.sql"));
        assert!(!has_dedupe_marker("notes/todo.md"));
    }

    #[test]
    fn canonical_markers_are_counted_separately() {
        assert_eq!(canonical_bonus_markers("a/b.md"), 0);
        assert_eq!(
            canonical_bonus_markers("x/Workspace/Maroon/Canonical/doc.md"),
            1
        );
        assert_eq!(
            canonical_bonus_markers(
                "x/workspace/maroon/canonical/reports/operating_registers/r.md"
            ),
            2
        );
    }
}
