use std::fmt;

use crate::document::DomError;

/// Failures surfaced by mounting, flushing and contract checks.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    HookOrder { component: String, detail: String },
    DepsLength { component: String, expected: usize, found: usize },
    MountTargetNotFound { selector: String },
    PortalTargetNotFound { selector: String },
    FlushLimitExceeded { limit: usize },
    Dom(DomError),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::HookOrder { component, detail } => write!(
                f,
                "hooks must be called unconditionally and in the same order (in {component}: {detail})"
            ),
            RuntimeError::DepsLength {
                component,
                expected,
                found,
            } => write!(
                f,
                "dependency list changed length between renders in {component}: expected {expected}, found {found}"
            ),
            RuntimeError::MountTargetNotFound { selector } => {
                write!(f, "mount target {selector} not found")
            }
            RuntimeError::PortalTargetNotFound { selector } => {
                write!(f, "portal target {selector} not found")
            }
            RuntimeError::FlushLimitExceeded { limit } => write!(
                f,
                "render loop did not settle after {limit} flush cycles; a state update is probably triggering itself"
            ),
            RuntimeError::Dom(err) => write!(f, "document error: {err}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Dom(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DomError> for RuntimeError {
    fn from(err: DomError) -> Self {
        RuntimeError::Dom(err)
    }
}
