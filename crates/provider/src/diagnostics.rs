//! Terraform diagnostics

use crate::error::Error;
use crate::tfplugin6::{attribute_path, diagnostic, AttributePath, Diagnostic};

/// Path to an attribute inside a configuration object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrPath(Vec<PathStep>);

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathStep {
    Name(String),
    Index(i64),
}

impl AttrPath {
    pub fn root(name: &str) -> Self {
        Self(vec![PathStep::Name(name.to_string())])
    }

    pub fn attr(&self, name: &str) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Name(name.to_string()));
        Self(steps)
    }

    pub fn index(&self, i: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Index(i as i64));
        Self(steps)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for AttrPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Name(n) if i == 0 => write!(f, "{}", n)?,
                PathStep::Name(n) => write!(f, ".{}", n)?,
                PathStep::Index(n) => write!(f, "[{}]", n)?,
            }
        }
        Ok(())
    }
}

impl From<&AttrPath> for AttributePath {
    fn from(path: &AttrPath) -> Self {
        AttributePath {
            steps: path
                .0
                .iter()
                .map(|step| attribute_path::Step {
                    selector: Some(match step {
                        PathStep::Name(n) => attribute_path::step::Selector::AttributeName(n.clone()),
                        PathStep::Index(i) => attribute_path::step::Selector::ElementKeyInt(*i),
                    }),
                })
                .collect(),
        }
    }
}

/// Accumulated diagnostics for one RPC
#[derive(Debug, Clone, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(diagnostic::Severity::Error, summary, detail, None);
    }

    pub fn warning(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(diagnostic::Severity::Warning, summary, detail, None);
    }

    pub fn attribute_error(
        &mut self,
        path: &AttrPath,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.push(diagnostic::Severity::Error, summary, detail, Some(path));
    }

    /// Record a handler failure
    pub fn from_error(&mut self, summary: impl Into<String>, err: &Error) {
        self.error(summary, err.detail());
    }

    fn push(
        &mut self,
        severity: diagnostic::Severity,
        summary: impl Into<String>,
        detail: impl Into<String>,
        path: Option<&AttrPath>,
    ) {
        self.0.push(Diagnostic {
            severity: severity as i32,
            summary: summary.into(),
            detail: detail.into(),
            attribute: path.filter(|p| !p.is_empty()).map(AttributePath::from),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.0
            .iter()
            .any(|d| d.severity == diagnostic::Severity::Error as i32)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }
}

impl From<Diagnostics> for Vec<Diagnostic> {
    fn from(diags: Diagnostics) -> Self {
        diags.0
    }
}
