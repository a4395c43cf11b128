use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required input is missing; nothing was launched.
    Validation,
    /// Unknown method or malformed schema.
    Schema,
    /// The external process could not be started.
    Launch,
    Config,
    Other,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Schema => "SCHEMA_ERROR",
            ErrorKind::Launch => "LAUNCH_ERROR",
            ErrorKind::Config => "CONFIG_ERROR",
            ErrorKind::Other => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
}

impl Error {
    pub fn msg<M: Into<String>>(msg: M) -> Self {
        Self {
            kind: ErrorKind::Other,
            msg: msg.into(),
        }
    }

    pub fn validation<M: Into<String>>(msg: M) -> Self {
        Self {
            kind: ErrorKind::Validation,
            msg: msg.into(),
        }
    }

    pub fn schema<M: Into<String>>(msg: M) -> Self {
        Self {
            kind: ErrorKind::Schema,
            msg: msg.into(),
        }
    }

    pub fn launch<M: Into<String>>(msg: M) -> Self {
        Self {
            kind: ErrorKind::Launch,
            msg: msg.into(),
        }
    }

    pub fn config<M: Into<String>>(msg: M) -> Self {
        Self {
            kind: ErrorKind::Config,
            msg: msg.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::msg(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::msg(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind() {
        assert_eq!(Error::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(Error::schema("x").kind(), ErrorKind::Schema);
        assert_eq!(Error::launch("x").kind(), ErrorKind::Launch);
        assert_eq!(Error::msg("x").kind(), ErrorKind::Other);
    }

    #[test]
    fn display_is_the_bare_message() {
        let e = Error::validation("Please select a data path");
        assert_eq!(e.to_string(), "Please select a data path");
        assert_eq!(e.kind().code(), "VALIDATION_ERROR");
    }
}
