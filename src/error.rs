use thiserror::Error;

pub type VcfResult<T> = std::result::Result<T, VcfError>;

#[derive(Debug, Error)]
pub enum VcfError {
    #[error("Invalid header{}: {message}", at_line(.line))]
    InvalidHeader {
        message: String,
        line: Option<usize>,
    },
    #[error("Incorrect VCF format{}: {message}", at_line(.line))]
    IncorrectFormat {
        message: String,
        line: Option<usize>,
    },
    #[error("Invalid record{}{}: {message}", at_line(.line), in_field(.field))]
    InvalidRecord {
        message: String,
        line: Option<usize>,
        field: Option<String>,
    },
    #[error("No {kind} header line found for ID {id}")]
    HeaderNotFound { kind: &'static str, id: String },
    #[error("Backend {0} is not available in this build")]
    BackendUnavailable(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "htslib")]
    #[error(transparent)]
    Htslib(#[from] rust_htslib::errors::Error),
}

fn at_line(line: &Option<usize>) -> String {
    line.map(|n| format!(" at line {n}")).unwrap_or_default()
}

fn in_field(field: &Option<String>) -> String {
    field
        .as_ref()
        .map(|f| format!(" in field {f}"))
        .unwrap_or_default()
}

impl VcfError {
    pub fn header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
            line: None,
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::IncorrectFormat {
            message: message.into(),
            line: None,
        }
    }

    pub fn record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
            line: None,
            field: None,
        }
    }

    /// Attaches a 1-based source line number. An already recorded line is kept.
    pub fn with_line(mut self, line_no: usize) -> Self {
        match &mut self {
            Self::InvalidHeader { line, .. }
            | Self::IncorrectFormat { line, .. }
            | Self::InvalidRecord { line, .. } => {
                line.get_or_insert(line_no);
            }
            _ => {}
        }
        self
    }

    /// Names the record field an error was raised for. An already recorded field is kept.
    pub fn with_field(mut self, name: &str) -> Self {
        if let Self::InvalidRecord { field, .. } = &mut self {
            field.get_or_insert_with(|| name.to_string());
        }
        self
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            Self::InvalidHeader { line, .. }
            | Self::IncorrectFormat { line, .. }
            | Self::InvalidRecord { line, .. } => *line,
            _ => None,
        }
    }
}

#[macro_export]
macro_rules! header_error {
    ($($arg:tt)*) => {
        $crate::error::VcfError::header(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! format_error {
    ($($arg:tt)*) => {
        $crate::error::VcfError::format(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! record_error {
    ($($arg:tt)*) => {
        $crate::error::VcfError::record(format!($($arg)*))
    };
}
