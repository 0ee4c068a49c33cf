use thiserror::Error;

/// Main error type for the askdb agent
///
/// Each pipeline stage surfaces its own kind so the caller can tell
/// "could not generate SQL" apart from "the SQL failed to run" apart from
/// "could not connect to the database". The underlying driver or provider
/// message is always preserved in `message`.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("could not connect to the database: {message}")]
    Connection { message: String },

    #[error("could not read the database schema: {message}")]
    Introspection { message: String },

    #[error("SQL generation failed: {message}")]
    Generation { message: String },

    #[error("no SQL statement found in the model response")]
    NoStatement,

    #[error("query execution failed: {message}")]
    Execution { message: String },

    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl AgentError {
    /// Create a new connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a new introspection error
    pub fn introspection(message: impl Into<String>) -> Self {
        Self::Introspection {
            message: message.into(),
        }
    }

    /// Create a new generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Create a new execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using AgentError
pub type AgentResult<T> = Result<T, AgentError>;
