//! Conversion of engine diagnostics to wire diagnostics

use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticRelatedInformation, DiagnosticSeverity, DiagnosticTag, Location,
    NumberOrString,
};

use crate::compiler::engine::{EngineDiagnostic, EngineTag, Severity, SourceLocation};
use crate::compiler::paths::SourcePaths;
use crate::compiler::snapshot::ProgramSnapshot;

pub fn severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    }
}

pub fn tag(tag: EngineTag) -> DiagnosticTag {
    match tag {
        EngineTag::Unnecessary => DiagnosticTag::UNNECESSARY,
        EngineTag::Deprecated => DiagnosticTag::DEPRECATED,
    }
}

fn code(code: u64) -> NumberOrString {
    i32::try_from(code)
        .map(NumberOrString::Number)
        .unwrap_or_else(|_| NumberOrString::String(code.to_string()))
}

fn location(
    location: &SourceLocation,
    snapshot: &ProgramSnapshot,
    paths: &SourcePaths,
) -> Option<Location> {
    Some(Location {
        uri: paths.uri(&location.source_name)?,
        range: snapshot.range(&location.source_name, location.span)?,
    })
}

/// Converts an engine diagnostic.
///
/// Returns `None` when the primary location is missing or lies in a source the
/// snapshot has no text for. Secondary locations that cannot be mapped are dropped.
pub fn to_lsp(
    diagnostic: &EngineDiagnostic,
    snapshot: &ProgramSnapshot,
    paths: &SourcePaths,
    source: &str,
) -> Option<Diagnostic> {
    let primary = diagnostic.location.as_ref()?;
    let range = snapshot.range(&primary.source_name, primary.span)?;

    let related: Vec<DiagnosticRelatedInformation> = diagnostic
        .secondary
        .iter()
        .filter_map(|(message, secondary)| {
            Some(DiagnosticRelatedInformation {
                location: location(secondary, snapshot, paths)?,
                message: message.clone(),
            })
        })
        .collect();

    let tags: Vec<DiagnosticTag> = diagnostic.tags.iter().copied().map(tag).collect();

    Some(Diagnostic {
        range,
        severity: Some(severity(diagnostic.severity)),
        code: diagnostic.code.map(code),
        source: Some(source.to_string()),
        message: diagnostic.message.clone(),
        related_information: (!related.is_empty()).then_some(related),
        tags: (!tags.is_empty()).then_some(tags),
        ..Default::default()
    })
}
