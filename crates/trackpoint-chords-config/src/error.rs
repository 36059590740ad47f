use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(trackpoint_chords::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(trackpoint_chords::config::invalid))]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    #[diagnostic(code(trackpoint_chords::config::missing_field))]
    MissingField { field: String },

    #[error("Unknown keysym(s): {}", names.join(", "))]
    #[diagnostic(
        code(trackpoint_chords::config::unknown_keysym),
        help("use a keysym name such as Control_L, Shift_R or ISO_Level3_Shift, or a hex value like 0xfe03")
    )]
    UnknownKeysym {
        #[source_code]
        src: String,
        #[label("not a known keysym")]
        span: miette::SourceSpan,
        names: Vec<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
