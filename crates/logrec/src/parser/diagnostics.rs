use super::model::ParseError;

/// Receives recoverable per-line problems found while parsing.
pub trait DiagnosticsSink {
    fn warn(&mut self, line_number: u64, warning: &ParseError);
}

impl<D: DiagnosticsSink + ?Sized> DiagnosticsSink for &mut D {
    fn warn(&mut self, line_number: u64, warning: &ParseError) {
        (**self).warn(line_number, warning)
    }
}

/// Forwards warnings to `tracing`, tagged with the stream they came from.
#[derive(Debug, Clone)]
pub struct TracingDiagnostics {
    source: String,
}

impl TracingDiagnostics {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }
}

impl DiagnosticsSink for TracingDiagnostics {
    fn warn(&mut self, line_number: u64, warning: &ParseError) {
        tracing::warn!(source = %self.source, line = line_number, "{}", warning);
    }
}

/// Keeps every warning in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectedDiagnostics {
    pub warnings: Vec<(u64, ParseError)>,
}

impl CollectedDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.warnings
            .iter()
            .map(|(line, w)| format!("line {}: {}", line, w))
            .collect()
    }
}

impl DiagnosticsSink for CollectedDiagnostics {
    fn warn(&mut self, line_number: u64, warning: &ParseError) {
        self.warnings.push((line_number, warning.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::model::RuleKind;

    #[test]
    fn test_collected_diagnostics() {
        let mut diagnostics = CollectedDiagnostics::new();
        assert!(diagnostics.is_empty());

        diagnostics.warn(3, &ParseError::OrphanTransition(RuleKind::Body));
        diagnostics.warn(7, &ParseError::NonUtf8);

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(
            diagnostics.messages(),
            vec![
                "line 3: Orphaned body line: no active record".to_string(),
                "line 7: Non-UTF8 content".to_string(),
            ]
        );
    }

    #[test]
    fn test_forwarding_through_mut_ref() {
        fn report(sink: &mut dyn DiagnosticsSink) {
            sink.warn(1, &ParseError::NonUtf8);
        }

        let mut diagnostics = CollectedDiagnostics::new();
        let mut borrowed = &mut diagnostics;
        report(&mut borrowed);
        assert_eq!(diagnostics.len(), 1);
    }
}
