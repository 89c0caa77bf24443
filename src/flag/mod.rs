//! A small command-line flag parser.
//!
//! Flags are single-dash names that always take a value: `-n 5`, `-n=5`.
//! A double dash is accepted in place of a single one (`--n 5`), a bare
//! `--` ends flag parsing, and so does the first argument that is not a
//! flag. Whatever follows is available from [`FlagSet::args`].
//!
//! Each flag is bound to a setter closure, usually one that writes into a
//! field of a configuration struct, so parsing updates the struct in place.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{self, Write};

use tracing::debug;

use crate::core::FlagError;

type Setter<'a> = Box<dyn FnMut(&str) -> Result<(), String> + 'a>;

/// A single defined flag.
pub struct Flag<'a> {
    name: String,
    usage: String,
    set: Setter<'a>,
}

impl<'a> Flag<'a> {
    /// Name as it appears on the command line, without dashes
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Help message
    pub fn usage(&self) -> &str {
        &self.usage
    }
}

impl fmt::Debug for Flag<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .finish()
    }
}

/// A set of defined flags.
pub struct FlagSet<'a> {
    name: String,
    formal: BTreeMap<String, Flag<'a>>,
    actual: BTreeSet<String>,
    args: Vec<String>,
    pos: usize,
    parsed: bool,
    output: Box<dyn Write + 'a>,
}

impl<'a> FlagSet<'a> {
    /// Create an empty set. `name` appears in the usage header; pass an empty
    /// string for a plain `Usage:` line.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            formal: BTreeMap::new(),
            actual: BTreeSet::new(),
            args: Vec::new(),
            pos: 0,
            parsed: false,
            output: Box::new(io::stdout()),
        }
    }

    /// Send usage output (printed on `-h`) somewhere other than stdout
    pub fn with_output(mut self, output: impl Write + 'a) -> Self {
        self.output = Box::new(output);
        self
    }

    /// Define a flag. `set` receives the raw value and returns a reason
    /// string when it rejects it.
    pub fn define<F>(
        &mut self,
        name: impl Into<String>,
        usage: impl Into<String>,
        set: F,
    ) -> Result<(), FlagError>
    where
        F: FnMut(&str) -> Result<(), String> + 'a,
    {
        let name = name.into();
        if self.formal.contains_key(&name) {
            return Err(FlagError::Redefined(if self.name.is_empty() {
                name
            } else {
                format!("{} {}", self.name, name)
            }));
        }

        let flag = Flag {
            name: name.clone(),
            usage: usage.into(),
            set: Box::new(set),
        };
        self.formal.insert(name, flag);
        Ok(())
    }

    /// Parse `arguments`, which should not include the program name.
    ///
    /// Stops at the first error and returns it. `-h` and `-help`, unless
    /// defined, print usage and return [`FlagError::HelpRequested`].
    pub fn parse<I, S>(&mut self, arguments: I) -> Result<(), FlagError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parsed = true;
        self.args = arguments.into_iter().map(Into::into).collect();
        self.pos = 0;

        while self.parse_one()? {}
        Ok(())
    }

    /// Parse one flag. Reports whether a flag was seen.
    fn parse_one(&mut self) -> Result<bool, FlagError> {
        let Some(arg) = self.args.get(self.pos).cloned() else {
            return Ok(false);
        };
        if arg.len() < 2 || !arg.starts_with('-') {
            return Ok(false);
        }

        let mut dashes = 1;
        if arg[1..].starts_with('-') {
            dashes += 1;
            if arg.len() == 2 {
                // "--" terminates the flags
                self.pos += 1;
                return Ok(false);
            }
        }

        let name = &arg[dashes..];
        if name.is_empty() || name.starts_with('-') || name.starts_with('=') {
            return Err(FlagError::BadSyntax(arg.clone()));
        }

        // It's a flag. Does it carry its value?
        self.pos += 1;
        let (name, inline) = match name.char_indices().skip(1).find(|&(_, c)| c == '=') {
            Some((eq, _)) => (&name[..eq], Some(name[eq + 1..].to_string())),
            None => (name, None),
        };

        if !self.formal.contains_key(name) {
            if name == "help" || name == "h" {
                self.print_usage();
                return Err(FlagError::HelpRequested);
            }
            return Err(FlagError::NotDefined(name.to_string()));
        }

        // It must have a value, which might be the next argument.
        let value = match inline {
            Some(value) => value,
            None => match self.args.get(self.pos) {
                Some(next) => {
                    self.pos += 1;
                    next.clone()
                }
                None => return Err(FlagError::NeedsArgument(name.to_string())),
            },
        };

        if let Some(flag) = self.formal.get_mut(name) {
            (flag.set)(&value).map_err(|reason| FlagError::InvalidValue {
                value: value.clone(),
                name: name.to_string(),
                reason,
            })?;
        }
        debug!(flag = name, value = %value, "flag set");
        self.actual.insert(name.to_string());
        Ok(true)
    }

    /// Whether `parse` has been called
    pub fn parsed(&self) -> bool {
        self.parsed
    }

    /// Arguments left after flag parsing stopped
    pub fn args(&self) -> &[String] {
        self.args.get(self.pos..).unwrap_or(&[])
    }

    /// Whether the named flag was given on the command line
    pub fn is_set(&self, name: &str) -> bool {
        self.actual.contains(name)
    }

    /// Visit every defined flag in lexicographical order, set or not
    pub fn visit_all<F>(&self, mut f: F)
    where
        F: FnMut(&Flag<'a>),
    {
        self.formal.values().for_each(|flag| f(flag));
    }

    /// Render the usage message
    pub fn usage(&self) -> String {
        let mut out = if self.name.is_empty() {
            "Usage:\n".to_string()
        } else {
            format!("Usage of {}:\n", self.name)
        };
        self.visit_all(|flag| {
            out.push_str(&format!("  -{} {}\n", flag.name, flag.usage));
        });
        out
    }

    /// Write the usage message to the configured output
    pub fn print_usage(&mut self) {
        let usage = self.usage();
        if let Err(err) = self
            .output
            .write_all(usage.as_bytes())
            .and_then(|_| self.output.flush())
        {
            debug!(error = %err, "failed to write usage");
        }
    }
}

impl fmt::Debug for FlagSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagSet")
            .field("name", &self.name)
            .field("formal", &self.formal.keys().collect::<Vec<_>>())
            .field("actual", &self.actual)
            .field("args", &self.args())
            .finish()
    }
}

/// Parse an integer the way `-n 0x1f` users expect: optional sign, then
/// `0x`, `0o` or `0b` for hex, octal or binary, a leading `0` for octal,
/// decimal otherwise. Single underscores may separate digits or follow a
/// base prefix.
pub fn parse_int(value: &str) -> Result<i64, String> {
    let (negative, body) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(d) = lower.strip_prefix("0x") {
        (16, d)
    } else if let Some(d) = lower.strip_prefix("0o") {
        (8, d)
    } else if let Some(d) = lower.strip_prefix("0b") {
        (2, d)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };

    let digits: String = digits.chars().filter(|&c| c != '_').collect();
    if digits.is_empty() || digits.starts_with(['+', '-']) || !underscores_ok(&lower) {
        return Err(format!("parsing {:?}: invalid syntax", value));
    }

    let magnitude = u64::from_str_radix(&digits, radix)
        .map_err(|err| format!("parsing {:?}: {}", value, err))?;

    if negative {
        0i64.checked_sub_unsigned(magnitude)
            .ok_or_else(|| format!("parsing {:?}: value out of range", value))
    } else {
        i64::try_from(magnitude).map_err(|_| format!("parsing {:?}: value out of range", value))
    }
}

/// An underscore must follow a digit or a base prefix and be followed by a
/// digit. `body` is lowercase and unsigned.
fn underscores_ok(body: &str) -> bool {
    #[derive(PartialEq)]
    enum Saw {
        Start,
        Digit,
        Underscore,
        Other,
    }

    let bytes = body.as_bytes();
    let mut saw = Saw::Start;
    let mut hex = false;
    let mut i = 0;
    if bytes.len() >= 2 && bytes[0] == b'0' && matches!(bytes[1], b'b' | b'o' | b'x') {
        i = 2;
        saw = Saw::Digit;
        hex = bytes[1] == b'x';
    }

    for &b in &bytes[i..] {
        if b.is_ascii_digit() || (hex && (b'a'..=b'f').contains(&b)) {
            saw = Saw::Digit;
        } else if b == b'_' {
            if saw != Saw::Digit {
                return false;
            }
            saw = Saw::Underscore;
        } else if saw == Saw::Underscore {
            return false;
        } else {
            saw = Saw::Other;
        }
    }
    saw != Saw::Underscore
}

/// Setter that parses an integer into `target`
pub fn int_flag(target: &mut i64) -> impl FnMut(&str) -> Result<(), String> + '_ {
    move |value| {
        *target = parse_int(value)?;
        Ok(())
    }
}
