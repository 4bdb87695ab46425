use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while building, verifying or opening a scene-graph buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An offset points at or past the end of the buffer (or before its start)
    OutOfBounds { position: usize, buffer_len: usize },

    /// A structure starts inside the buffer but its declared extent runs past the end
    TruncatedBuffer { needed: usize, available: usize },

    /// A vtable is inconsistent with itself or with the table it describes
    MalformedVtable { table: usize, reason: &'static str },

    /// Verification budget (nesting depth or table count) exhausted
    DepthExceeded { limit: usize },

    /// A builder call arrived out of the required order
    WriterMisuse(Misuse),

    /// A text field is not valid UTF-8
    InvalidUtf8 { position: usize },

    /// The buffer exceeds the configured or format maximum size
    BufferTooLarge { len: usize, max: usize },
}

/// The specific contract a [`Builder`](crate::Builder) caller violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Misuse {
    /// `start_table` while another table is open
    NestedTable,
    /// A slot write or `end_table` with no table open
    NotInTable,
    /// A string or vector was created while a table is open
    WriteInsideTable,
    /// An offset that does not refer to a finished object of this builder
    UnfinishedReference,
    /// Slot index outside the table layout
    UnknownSlot(u16),
    /// A slot written with a value of the wrong storage kind or width
    SlotKind(u16),
    /// A slot written twice in the same table
    DuplicateSlot(u16),
    /// Any write after `finish`
    AlreadyFinished,
    /// Reading the finished data before `finish`
    NotFinished,
}

impl fmt::Display for Misuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Misuse::NestedTable => write!(f, "table started while another table is open"),
            Misuse::NotInTable => write!(f, "no table is open"),
            Misuse::WriteInsideTable => {
                write!(f, "strings and vectors must be created before start_table")
            }
            Misuse::UnfinishedReference => {
                write!(f, "offset does not refer to a finished object")
            }
            Misuse::UnknownSlot(slot) => write!(f, "slot {} is not part of the layout", slot),
            Misuse::SlotKind(slot) => {
                write!(f, "slot {} written with the wrong storage kind", slot)
            }
            Misuse::DuplicateSlot(slot) => {
                write!(f, "slot {} already written in this table", slot)
            }
            Misuse::AlreadyFinished => write!(f, "buffer already finished"),
            Misuse::NotFinished => write!(f, "buffer not finished yet"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfBounds {
                position,
                buffer_len,
            } => write!(
                f,
                "offset {} out of bounds for buffer of {} bytes",
                position, buffer_len
            ),
            Error::TruncatedBuffer { needed, available } => write!(
                f,
                "truncated buffer: structure needs {} bytes, only {} available",
                needed, available
            ),
            Error::MalformedVtable { table, reason } => {
                write!(f, "malformed vtable for table at {}: {}", table, reason)
            }
            Error::DepthExceeded { limit } => {
                write!(f, "verification budget of {} exceeded", limit)
            }
            Error::WriterMisuse(m) => write!(f, "builder misuse: {}", m),
            Error::InvalidUtf8 { position } => {
                write!(f, "string at {} is not valid UTF-8", position)
            }
            Error::BufferTooLarge { len, max } => {
                write!(f, "buffer of {} bytes exceeds maximum {}", len, max)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<Misuse> for Error {
    fn from(m: Misuse) -> Self {
        Error::WriterMisuse(m)
    }
}
