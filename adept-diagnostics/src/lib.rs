// Diagnostics for the Adept compiler core
// Source locations, leveled diagnostics, and a collection sink with
// per-warning suppression

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod suggest;
pub use suggest::{nearest_name, SUGGESTION_MAX_DISTANCE};

/// Location of a construct within a compilation object.
///
/// `object_index` identifies the source object (file) the construct came
/// from, `index` is the byte offset into that object's buffer, and
/// `stride` is the length of the construct in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Source {
    pub object_index: usize,
    pub index: usize,
    pub stride: usize,
}

impl Source {
    /// Sentinel for constructs with no meaningful location
    pub const NONE: Source = Source {
        object_index: 0,
        index: 0,
        stride: 0,
    };

    pub fn new(object_index: usize, index: usize, stride: usize) -> Self {
        Self {
            object_index,
            index,
            stride,
        }
    }

    pub fn is_null(&self) -> bool {
        *self == Source::NONE
    }

    /// Compute the 1-based (line, column) pair of this source within `text`
    pub fn line_column(&self, text: &str) -> (usize, usize) {
        let upto = self.index.min(text.len());
        let before = &text[..upto];
        let line = before.chars().filter(|&c| c == '\n').count() + 1;
        let column = before.rfind('\n').map_or(upto + 1, |pos| upto - pos);
        (line, column)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}+{}", self.object_index, self.index, self.stride)
    }
}

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Error,
    Warning,
    Note,
    Help,
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorLevel::Error => write!(f, "{}", "error".red().bold()),
            ErrorLevel::Warning => write!(f, "{}", "warning".yellow().bold()),
            ErrorLevel::Note => write!(f, "{}", "note".cyan().bold()),
            ErrorLevel::Help => write!(f, "{}", "help".green().bold()),
        }
    }
}

/// Warnings that can be individually suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    UnreachableCode,
    UnusedVariable,
    PartialSupport,
    Deprecation,
    Obsolete,
    MultiplePossibilities,
}

impl WarningKind {
    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Which warnings are currently enabled, plus escalation behavior
#[derive(Debug, Clone, Copy)]
pub struct WarningSettings {
    suppressed: u32,
    /// Promote warnings to errors (the FUSSY compiler trait)
    pub fussy: bool,
    /// Drop all warnings (the NO_WARN compiler trait)
    pub silent: bool,
}

impl Default for WarningSettings {
    fn default() -> Self {
        Self {
            suppressed: 0,
            fussy: false,
            silent: false,
        }
    }
}

impl WarningSettings {
    pub fn suppress(&mut self, kind: WarningKind) {
        self.suppressed |= kind.bit();
    }

    pub fn is_suppressed(&self, kind: WarningKind) -> bool {
        self.silent || self.suppressed & kind.bit() != 0
    }
}

/// Structured diagnostic message
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: ErrorLevel,
    pub message: String,
    pub source: Source,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(level: ErrorLevel, message: impl Into<String>, source: Source) -> Self {
        Self {
            level,
            message: message.into(),
            source,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn error(message: impl Into<String>, source: Source) -> Self {
        Self::new(ErrorLevel::Error, message, source)
    }

    pub fn warning(message: impl Into<String>, source: Source) -> Self {
        Self::new(ErrorLevel::Warning, message, source)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render with access to the object name table and (optionally) the
    /// text of the object the diagnostic points into
    pub fn format(&self, object_names: &[String], object_text: Option<&str>) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}: {}\n", self.level, self.message.bold()));

        let location = match (object_names.get(self.object_index()), object_text) {
            (Some(name), Some(text)) => {
                let (line, column) = self.source.line_column(text);
                format!("{}:{}:{}", name, line, column)
            }
            (Some(name), None) => format!("{}:+{}", name, self.source.index),
            _ => self.source.to_string(),
        };
        output.push_str(&format!(" {} {}\n", "-->".cyan().bold(), location));

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        output
    }

    fn object_index(&self) -> usize {
        self.source.object_index
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.message)?;
        if !self.source.is_null() {
            write!(f, " ({})", self.source)?;
        }
        Ok(())
    }
}

/// Diagnostic collection sink for one compilation
#[derive(Debug, Default)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
    pub warnings: WarningSettings,
}

impl Diagnostics {
    pub fn new(warnings: WarningSettings) -> Self {
        Self {
            warnings,
            ..Self::default()
        }
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.level {
            ErrorLevel::Error => self.error_count += 1,
            ErrorLevel::Warning => self.warning_count += 1,
            _ => {}
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, message: impl Into<String>, source: Source) {
        self.emit(Diagnostic::error(message, source));
    }

    /// Emit a suppressible warning. Returns true if the warning was
    /// escalated to an error (FUSSY), in which case the caller should
    /// treat the current operation as failed.
    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>, source: Source) -> bool {
        if self.warnings.is_suppressed(kind) {
            return false;
        }

        if self.warnings.fussy {
            self.error(message, source);
            return true;
        }

        self.emit(Diagnostic::warning(message, source));
        false
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn print_all(&self, object_names: &[String]) {
        for diagnostic in &self.diagnostics {
            eprintln!("{}", diagnostic.format(object_names, None));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_source() {
        assert!(Source::NONE.is_null());
        assert!(!Source::new(0, 4, 1).is_null());
    }

    #[test]
    fn test_line_column() {
        let text = "first\nsecond\nthird";
        assert_eq!(Source::new(0, 0, 1).line_column(text), (1, 1));
        assert_eq!(Source::new(0, 6, 1).line_column(text), (2, 1));
        assert_eq!(Source::new(0, 9, 1).line_column(text), (2, 4));
    }

    #[test]
    fn test_warning_suppression() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.warnings.suppress(WarningKind::UnusedVariable);

        diagnostics.warn(WarningKind::UnusedVariable, "unused variable 'x'", Source::NONE);
        assert_eq!(diagnostics.warning_count(), 0);

        diagnostics.warn(WarningKind::Deprecation, "'f' is deprecated", Source::NONE);
        assert_eq!(diagnostics.warning_count(), 1);
    }

    #[test]
    fn test_fussy_promotes_warnings() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.warnings.fussy = true;

        let escalated =
            diagnostics.warn(WarningKind::UnreachableCode, "unreachable code", Source::NONE);
        assert!(escalated);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn test_silent_drops_everything() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.warnings.silent = true;
        diagnostics.warnings.fussy = true;

        let escalated =
            diagnostics.warn(WarningKind::Obsolete, "obsolete construct", Source::NONE);
        assert!(!escalated);
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.warning_count(), 0);
    }
}
