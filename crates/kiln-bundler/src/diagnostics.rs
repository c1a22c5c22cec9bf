//! Source-annotated diagnostics for build failures.
//!
//! [`diagnose`] turns an [`Error`] into a miette diagnostic that carries the
//! offending file's text and a label at the failing location, loaded through
//! the same [`Runtime`] the build used.

use std::fmt;
use std::path::PathBuf;

use kiln_graph::Runtime;
use miette::{Diagnostic, LabeledSpan, NamedSource, Severity};

use crate::Error;

/// A build error with an optional source snippet.
#[derive(Debug)]
pub struct SourceDiagnostic {
    message: String,
    code: String,
    help: Option<String>,
    label: Option<(&'static str, usize, usize)>,
    source_code: Option<NamedSource<String>>,
}

impl SourceDiagnostic {
    /// Diagnostic for `error`; `source` is the text of the file the error
    /// points at, when it could be read.
    pub fn new(error: &Error, source: Option<(String, String)>) -> Self {
        let code = error
            .code()
            .map_or_else(|| "BUILD_ERROR".to_string(), |code| code.to_string());
        let help = error.help().map(|help| help.to_string());

        let label = source
            .as_ref()
            .and_then(|(_, text)| locate(error, text));
        let source_code = match (&label, source) {
            (Some(_), Some((name, text))) => Some(NamedSource::new(name, text)),
            _ => None,
        };

        Self {
            message: error.to_string(),
            code,
            help,
            label,
            source_code,
        }
    }

    /// Labelled byte range, if the error could be located.
    pub fn span(&self) -> Option<(usize, usize)> {
        self.label.map(|(_, offset, len)| (offset, len))
    }
}

impl fmt::Display for SourceDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SourceDiagnostic {}

impl Diagnostic for SourceDiagnostic {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        Some(Box::new(&self.code))
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn fmt::Display + '_>> {
        self.help
            .as_ref()
            .map(|help| Box::new(help) as Box<dyn fmt::Display + '_>)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source_code
            .as_ref()
            .map(|source| source as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        self.label.map(|(label, offset, len)| {
            Box::new(std::iter::once(LabeledSpan::new(
                Some(label.to_string()),
                offset,
                len,
            ))) as Box<dyn Iterator<Item = LabeledSpan>>
        })
    }
}

/// Build a diagnostic for `error`, reading the file it points at.
pub async fn diagnose(runtime: &dyn Runtime, error: &Error) -> SourceDiagnostic {
    let source = match source_path(error) {
        Some(path) => runtime
            .read_file(&path)
            .await
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .map(|text| (path.display().to_string(), text)),
        None => None,
    };
    SourceDiagnostic::new(error, source)
}

fn source_path(error: &Error) -> Option<PathBuf> {
    match error {
        Error::Parse(err) if !err.module.is_virtual() => Some(err.module.as_path().to_path_buf()),
        Error::Resolution(err) if err.origin.extension().is_some() => Some(err.origin.clone()),
        Error::Transform(err) if !err.module.is_virtual() => {
            Some(err.module.as_path().to_path_buf())
        }
        _ => None,
    }
}

fn locate(error: &Error, source: &str) -> Option<(&'static str, usize, usize)> {
    match error {
        Error::Parse(err) => {
            let offset = line_col_to_offset(source, err.line, err.column)?;
            Some(("Parse error", offset, calculate_span_length(source, offset)))
        }
        Error::Resolution(err) => {
            let offset = find_specifier(source, &err.specifier)?;
            Some(("Unresolved import", offset, err.specifier.len()))
        }
        _ => None,
    }
}

/// Byte offset of one-based `line`/`column` (column in characters).
pub fn line_col_to_offset(source: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }

    let mut offset = 0;
    for (index, text) in source.split('\n').enumerate() {
        if index + 1 == line {
            let col_bytes = text
                .char_indices()
                .nth(column.saturating_sub(1))
                .map_or(text.len(), |(pos, _)| pos);
            return Some(offset + col_bytes);
        }
        offset += text.len() + 1;
    }
    None
}

/// Length of the identifier starting at `offset`, at least one byte.
pub fn calculate_span_length(source: &str, offset: usize) -> usize {
    let Some(remaining) = source.get(offset..) else {
        return 1;
    };
    remaining
        .char_indices()
        .find(|(_, c)| !c.is_alphanumeric() && *c != '_')
        .map_or(remaining.len(), |(pos, _)| pos)
        .max(1)
}

/// Offset of `specifier` inside its quotes.
fn find_specifier(source: &str, specifier: &str) -> Option<usize> {
    ['\'', '"', '`'].iter().find_map(|quote| {
        source
            .find(&format!("{quote}{specifier}{quote}"))
            .map(|pos| pos + 1)
    })
}
