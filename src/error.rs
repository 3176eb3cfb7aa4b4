use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClearanceError {
    /// The caller supplied a name the certificate cannot be issued for.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Font loading or a drawing backend failed; no bytes are returned.
    #[error("render error: {0}")]
    Render(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClearanceError {
    /// True for errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ClearanceError::InvalidInput(_))
    }
}

impl From<lopdf::Error> for ClearanceError {
    fn from(value: lopdf::Error) -> Self {
        ClearanceError::Render(format!("pdf write failed: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_input_errors_are_client_errors() {
        assert!(ClearanceError::InvalidInput("short".into()).is_client_error());
        assert!(!ClearanceError::Render("font".into()).is_client_error());
        assert!(!ClearanceError::InvalidConfiguration("len".into()).is_client_error());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = ClearanceError::Render("no usable font".into());
        assert_eq!(err.to_string(), "render error: no usable font");
    }
}
