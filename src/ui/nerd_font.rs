/// Curated nerd font icons used across the package bridge UI.
///
/// A fixed set instead of a fonts crate: every icon here is well supported
/// across nerd font implementations and semantically tied to one usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NerdFont {
    // Status and feedback
    Check,
    Cross,
    Warning,
    Info,
    Question,

    // Package operations
    Package,
    Download,
    Trash,
    Search,
    Refresh,
    List,

    // System and privileges
    Gear,
    Lock,
    Font,
}

impl NerdFont {
    /// Get the Unicode character for this nerd font icon
    pub const fn unicode(&self) -> char {
        match self {
            // Status and feedback
            Self::Check => '\u{f00c}',    // fa-check
            Self::Cross => '\u{f00d}',    // fa-times
            Self::Warning => '\u{f071}',  // fa-exclamation-triangle
            Self::Info => '\u{f05a}',     // fa-info-circle
            Self::Question => '\u{f059}', // fa-question-circle

            // Package operations
            Self::Package => '\u{f187}',  // fa-archive
            Self::Download => '\u{f019}', // fa-download
            Self::Trash => '\u{f014}',    // fa-trash-o
            Self::Search => '\u{f002}',   // fa-search
            Self::Refresh => '\u{f021}',  // fa-refresh
            Self::List => '\u{f03a}',     // fa-list

            // System and privileges
            Self::Gear => '\u{f013}', // fa-gear
            Self::Lock => '\u{f023}', // fa-lock
            Self::Font => '\u{f031}', // fa-font
        }
    }
}

impl std::fmt::Display for NerdFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.unicode())
    }
}

impl From<NerdFont> for char {
    fn from(icon: NerdFont) -> Self {
        icon.unicode()
    }
}

impl From<NerdFont> for String {
    fn from(icon: NerdFont) -> Self {
        icon.unicode().to_string()
    }
}
