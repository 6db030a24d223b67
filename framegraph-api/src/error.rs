pub type FgResult<T> = Result<T, FgError>;

/// Generic error that contains all the different kinds of errors that may occur when talking to
/// the device
#[derive(Debug, Clone)]
pub enum FgError {
    StringError(String),
}

impl std::error::Error for FgError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            FgError::StringError(_) => None,
        }
    }
}

impl core::fmt::Display for FgError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            FgError::StringError(ref e) => e.fmt(fmt),
        }
    }
}

impl From<&str> for FgError {
    fn from(str: &str) -> Self {
        FgError::StringError(str.to_string())
    }
}

impl From<String> for FgError {
    fn from(string: String) -> Self {
        FgError::StringError(string)
    }
}
