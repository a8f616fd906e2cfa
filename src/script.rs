//! The line-oriented command language driving a [`BPlusTree`].
//!
//! A script holds one command per line, of the form `Operation(arg1[,arg2])`:
//!
//! | command | effect | output |
//! |---|---|---|
//! | `Initialize(m)` | replaces the tree with an empty one of order `m` | none |
//! | `Insert(key,value)` | inserts a record | none |
//! | `Delete(key)` | deletes the newest record with `key` | none |
//! | `Search(key)` | point lookup | the value, or `Null` |
//! | `Search(low,high)` | inclusive range scan | the values joined by `,`, or `Null` |
//!
//! Operation names are case-insensitive, whitespace anywhere on a line is ignored and blank
//! lines are skipped. A delete that finds nothing is logged and the script carries on.
//!
//! ```
//! use bplus_tree::script::Session;
//!
//! let script = "
//!     Initialize(3)
//!     Insert(21, 0.3534)
//!     Insert(108, 31.907)
//!     Insert(56089, 3.26)
//!     Delete(108)
//!     Search(56089)
//!     Search(108)
//!     Search(1, 60000)
//! ";
//! let output = Session::new().run(script)?;
//! assert_eq!(output, ["3.26", "Null", "0.3534,3.26"]);
//! # Ok::<(), bplus_tree::Error>(())
//! ```

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::{BPlusTree, Order};

/// Output line for a search that matched nothing.
pub const NULL: &str = "Null";

/// A parsed script line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Initialize { order: usize },
    Insert { key: i64, value: f64 },
    Delete { key: i64 },
    Search { key: i64 },
    SearchRange { low: i64, high: i64 },
}

impl Command {
    /// Returns `true` for commands that change the tree.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(self, Command::Insert { .. } | Command::Delete { .. })
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        let malformed = || Error::MalformedCommand(compact.clone());
        let (name, rest) = compact.split_once('(').ok_or_else(malformed)?;
        let arguments = rest.strip_suffix(')').ok_or_else(malformed)?;
        let arguments: Vec<&str> = arguments.split(',').collect();

        let command = if name.eq_ignore_ascii_case("Initialize") {
            match arguments.as_slice() {
                [order] => Command::Initialize {
                    order: parse_argument(order)?,
                },
                _ => return Err(malformed()),
            }
        } else if name.eq_ignore_ascii_case("Insert") {
            match arguments.as_slice() {
                [key, value] => Command::Insert {
                    key: parse_argument(key)?,
                    value: parse_argument(value)?,
                },
                _ => return Err(malformed()),
            }
        } else if name.eq_ignore_ascii_case("Delete") {
            match arguments.as_slice() {
                [key] => Command::Delete {
                    key: parse_argument(key)?,
                },
                _ => return Err(malformed()),
            }
        } else if name.eq_ignore_ascii_case("Search") {
            match arguments.as_slice() {
                [key] => Command::Search {
                    key: parse_argument(key)?,
                },
                [low, high] => Command::SearchRange {
                    low: parse_argument(low)?,
                    high: parse_argument(high)?,
                },
                _ => return Err(malformed()),
            }
        } else {
            return Err(Error::UnknownOperation(name.to_string()));
        };

        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Command::Initialize { order } => write!(f, "Initialize({order})"),
            Command::Insert { key, value } => write!(f, "Insert({key},{value:?})"),
            Command::Delete { key } => write!(f, "Delete({key})"),
            Command::Search { key } => write!(f, "Search({key})"),
            Command::SearchRange { low, high } => write!(f, "Search({low},{high})"),
        }
    }
}

fn parse_argument<T>(argument: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    argument.parse().map_err(|err: T::Err| Error::InvalidArgument {
        argument: argument.to_string(),
        reason: err.to_string(),
    })
}

/// Parses one script line; blank lines yield `None`.
///
/// # Errors
///
/// Returns [`Error::UnknownOperation`], [`Error::MalformedCommand`] or
/// [`Error::InvalidArgument`] for lines that are not a valid command.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    line.parse().map(Some)
}

/// Formats a value the way search results are written: shortest round-trip form, always
/// with a fractional part (`5.0`, `3.55`).
#[must_use]
pub fn render_value(value: f64) -> String {
    format!("{value:?}")
}

/// Formats range search results, or [`NULL`] when there are none.
#[must_use]
pub fn render_values(values: &[f64]) -> String {
    if values.is_empty() {
        return NULL.to_string();
    }
    values.iter().map(|&value| render_value(value)).collect::<Vec<_>>().join(",")
}

/// Executes commands against a tree and collects the search output.
#[derive(Debug, Default)]
pub struct Session {
    tree: Option<BPlusTree>,
    validate: bool,
}

impl Session {
    /// Creates a session with no tree; the script must start with `Initialize`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session that starts from an existing tree.
    #[must_use]
    pub fn with_tree(tree: BPlusTree) -> Self {
        Session {
            tree: Some(tree),
            validate: false,
        }
    }

    /// When enabled, the tree is validated after every insert and delete.
    #[must_use]
    pub fn validating(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Returns the current tree, if one has been initialized.
    #[must_use]
    pub fn tree(&self) -> Option<&BPlusTree> {
        self.tree.as_ref()
    }

    /// Executes a single command, returning its output line if it produces one.
    ///
    /// `Search(low,high)` with `low > high` scans `[high, low]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Uninitialized`] when no tree exists yet, [`Error::InvalidOrder`] for
    /// a bad `Initialize`, and [`Error::InvariantViolation`] if validation is enabled and
    /// fails. Deleting a missing key is not an error.
    pub fn execute(&mut self, command: Command) -> Result<Option<String>> {
        debug!(target: "bplus_tree::script", %command, "executing");

        if let Command::Initialize { order } = command {
            self.tree = Some(BPlusTree::with_order(Order::new(order)?));
            return Ok(None);
        }

        let tree = self.tree.as_mut().ok_or(Error::Uninitialized)?;
        let output = match command {
            Command::Initialize { .. } => unreachable!("handled above"),
            Command::Insert { key, value } => {
                tree.insert(key, value);
                None
            }
            Command::Delete { key } => {
                match tree.delete(key) {
                    Ok(_) => {}
                    Err(err @ (Error::KeyNotFound { .. } | Error::EmptyTree)) => {
                        warn!(target: "bplus_tree::script", key, "delete skipped: {err}");
                    }
                    Err(err) => return Err(err),
                }
                None
            }
            Command::Search { key } => {
                Some(tree.search(key).map_or_else(|| NULL.to_string(), render_value))
            }
            Command::SearchRange { low, high } => {
                let (low, high) = if low <= high { (low, high) } else { (high, low) };
                Some(render_values(&tree.search_range(low, high)))
            }
        };

        if self.validate && command.is_mutation() {
            tree.validate()?;
        }
        Ok(output)
    }

    /// Runs a whole script, returning the output lines.
    ///
    /// # Errors
    ///
    /// Stops at the first failing line and returns its error wrapped in
    /// [`Error::AtLine`] with the 1-based line number.
    pub fn run(&mut self, script: &str) -> Result<Vec<String>> {
        let mut output = Vec::new();
        for (index, line) in script.lines().enumerate() {
            let line_number = index + 1;
            let Some(command) = parse_line(line).map_err(|err| err.at_line(line_number))? else {
                continue;
            };
            if let Some(rendered) = self.execute(command).map_err(|err| err.at_line(line_number))? {
                output.push(rendered);
            }
        }
        Ok(output)
    }
}
