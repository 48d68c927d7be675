use std::borrow::Cow;

/// How file names and CSV keys are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    CaseInsensitive,
    CaseSensitive,
}

impl MatchMode {
    pub fn from_flag(case_sensitive: bool) -> Self {
        if case_sensitive {
            MatchMode::CaseSensitive
        } else {
            MatchMode::CaseInsensitive
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MatchMode::CaseInsensitive => "case-insensitive",
            MatchMode::CaseSensitive => "case-sensitive",
        }
    }

    /// Applied to both sides of every comparison.
    pub fn normalize(self, name: &str) -> Cow<'_, str> {
        match self {
            MatchMode::CaseSensitive => Cow::Borrowed(name),
            MatchMode::CaseInsensitive => Cow::Owned(name.to_lowercase()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insensitive_lowercases_ascii_and_unicode() {
        let mode = MatchMode::CaseInsensitive;
        assert_eq!(mode.normalize("Report.TXT"), "report.txt");
        assert_eq!(mode.normalize("ÉTÉ.pdf"), "été.pdf");
    }

    #[test]
    fn titlecase_letters_fold_too() {
        assert_eq!(MatchMode::CaseInsensitive.normalize("\u{1C5}x.txt"), "\u{1C6}x.txt");
    }

    #[test]
    fn sensitive_keeps_case() {
        assert_eq!(MatchMode::CaseSensitive.normalize("Report.TXT"), "Report.TXT");
    }

    #[test]
    fn flag_maps_to_mode() {
        assert_eq!(MatchMode::from_flag(true), MatchMode::CaseSensitive);
        assert_eq!(MatchMode::from_flag(false), MatchMode::CaseInsensitive);
    }
}
