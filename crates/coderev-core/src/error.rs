/// Errors that can occur while preparing or running a code review.
///
/// The `Display` output of each variant is the message shown to the user
/// when a review run fails, so provider diagnostics are kept verbatim.
/// Library crates use this type directly; the binary reports it through
/// `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use coderev_core::CoderevError;
///
/// let err = CoderevError::Provider {
///     status: 401,
///     body: "invalid_api_key".into(),
/// };
/// assert!(err.to_string().contains("401"));
/// assert!(err.to_string().contains("invalid_api_key"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CoderevError {
    /// An uploaded file could not be read as text.
    #[error("failed to read {name}: {reason}")]
    #[diagnostic(code(coderev::file_read))]
    FileRead {
        /// File name as presented to the user.
        name: String,
        /// Underlying cause.
        reason: String,
    },

    /// There is no code to review.
    #[error("upload at least one file or paste some code before requesting a review")]
    #[diagnostic(
        code(coderev::empty_input),
        help("pass one or more FILES, or use --stdin to paste code")
    )]
    EmptyInput,

    /// No API credential was supplied.
    #[error("enter an OpenAI API key before requesting a review")]
    #[diagnostic(
        code(coderev::missing_credential),
        help("set OPENAI_API_KEY, pass --api-key, or add api_key under [llm] in .coderev.toml")
    )]
    MissingCredential,

    /// The provider answered with a non-success HTTP status.
    #[error("OpenAI request failed ({status}): {body}")]
    #[diagnostic(code(coderev::provider))]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Transport-level failure (DNS, connect, timeout, reset).
    #[error("network error: {0}")]
    #[diagnostic(code(coderev::network))]
    Network(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(coderev::config))]
    Config(String),

    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(coderev::io))]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(coderev::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(coderev::toml))]
    Toml(#[from] toml::de::Error),
}
