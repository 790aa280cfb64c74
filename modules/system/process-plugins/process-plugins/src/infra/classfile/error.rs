use thiserror::Error;

/// Malformed class unit bytes.
#[derive(Debug, Error)]
pub enum ClassFormatError {
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("bad magic")]
    BadMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),

    #[error("invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("unknown {kind} tag {tag}")]
    UnknownTag { kind: &'static str, tag: u8 },

    #[error("{0} trailing bytes after digest")]
    TrailingBytes(usize),

    #[error("too many {what} to encode")]
    TooLarge { what: &'static str },
}

/// Class unit whose link-time metadata does not match its content.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("unit cannot be encoded")]
    Unencodable(#[from] ClassFormatError),

    #[error("digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch { expected: String, computed: String },

    #[error("malformed descriptor '{descriptor}' of {member}")]
    BadDescriptor { member: String, descriptor: String },

    #[error("entry frame of {method} is [{found}], expected [{expected}]")]
    FrameMismatch {
        method: String,
        expected: String,
        found: String,
    },
}
