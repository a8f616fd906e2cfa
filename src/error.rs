use alloc::boxed::Box;
use alloc::string::String;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Everything that can go wrong when building, mutating, checking or scripting a tree.
///
/// None of these are fatal to the tree itself: a failed [`delete`](crate::BPlusTree::delete)
/// leaves the tree unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The order is below the minimum of 3.
    #[error("invalid order {order}: a B+ tree needs an order of at least 3")]
    InvalidOrder { order: usize },

    /// A deletion was attempted before anything was inserted.
    #[error("tree is empty")]
    EmptyTree,

    /// A deletion named a key that is not in the tree.
    #[error("element {key} does not exist")]
    KeyNotFound { key: i64 },

    /// [`validate`](crate::BPlusTree::validate) found broken structural invariants.
    ///
    /// The report lists one violation per line.
    #[error("tree invariant violations:\n{0}")]
    InvariantViolation(String),

    /// A script line named an operation other than initialize, insert, delete or search.
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    /// A script line was not of the form `Operation(arg1[,arg2])`.
    #[error("malformed command `{0}`")]
    MalformedCommand(String),

    /// A script argument could not be parsed.
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument { argument: String, reason: String },

    /// A script operation ran before `Initialize`.
    #[error("tree used before Initialize")]
    Uninitialized,

    /// A script failed at a specific line.
    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn at_line(self, line: usize) -> Self {
        Error::AtLine {
            line,
            source: Box::new(self),
        }
    }
}
