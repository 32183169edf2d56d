/// Non-blocking message for the user, the terminal counterpart of a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub heading: String,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl Notification {
    pub fn info(heading: impl Into<String>, text: Option<String>) -> Self {
        Self {
            severity: Severity::Info,
            heading: heading.into(),
            text,
        }
    }

    pub fn success(heading: impl Into<String>, text: Option<String>) -> Self {
        Self {
            severity: Severity::Success,
            heading: heading.into(),
            text,
        }
    }

    pub fn error(heading: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            heading: heading.into(),
            text: Some(text.into()),
        }
    }
}
