use std::borrow::Cow;
use std::fmt;

/// Represents template errors.
///
/// Errors are created in three different phases.  Syntax errors are produced
/// while parsing and always stop the parser.  Render errors are produced while
/// a template is evaluated and are recovered according to the configured
/// [`ErrorMode`](crate::ErrorMode).  Configuration errors are reported when the
/// [`Environment`](crate::Environment) is set up.
///
/// # Example
///
/// Here is an example of you might want to render errors:
///
/// ```rust
/// # let env = miniliquid::Environment::new();
/// match env.parse("Hello {% nope %}") {
///     Ok(_) => unreachable!(),
///     Err(err) => {
///         eprintln!("Could not parse template:");
///         eprintln!("  {}", err);
///     }
/// }
/// ```
pub struct Error {
    kind: ErrorKind,
    detail: Option<Cow<'static, str>>,
    name: Option<String>,
    lineno: usize,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("detail", &self.detail)
            .field("name", &self.name)
            .field("lineno", &self.lineno)
            .field("source", &self.source)
            .finish()
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

impl Eq for Error {}

/// An enum describing the error kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The template has a malformed tag, variable or markup.
    SyntaxError,
    /// A tag or block name is not known to the registry.
    UnknownTag,
    /// A block was opened but its `end` marker is missing.
    UnterminatedBlock,
    /// A variable name is malformed (for instance it contains `%`).
    InvalidVariableName,
    /// A filter pipe (`|`) has nothing on one of its sides.
    EmptyFilter,
    /// Blocks are nested deeper than the environment permits.
    NestingTooDeep,
    /// A filter was applied that does not exist.
    UnknownFilter,
    /// A filter or tag was invoked with the wrong arguments.
    InvalidArguments,
    /// An operation on values failed (arithmetic faults, bad comparisons).
    InvalidOperation,
    /// A template referenced by name does not exist.
    TemplateNotFound,
    /// Data could not be converted into the internal value format.
    BadSerialization,
    /// A handler was registered twice under the same name.
    DuplicateRegistration,
}

/// The broad class an [`ErrorKind`] belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Raised while parsing.  Parsing always stops.
    Syntax,
    /// Raised while rendering.  Rendering always completes.
    Render,
    /// Raised while configuring the environment.
    Configuration,
}

impl ErrorKind {
    fn description(self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "syntax error",
            ErrorKind::UnknownTag => "unknown tag",
            ErrorKind::UnterminatedBlock => "unterminated block",
            ErrorKind::InvalidVariableName => "invalid variable name",
            ErrorKind::EmptyFilter => "empty filter",
            ErrorKind::NestingTooDeep => "nesting too deep",
            ErrorKind::UnknownFilter => "unknown filter",
            ErrorKind::InvalidArguments => "invalid arguments",
            ErrorKind::InvalidOperation => "invalid operation",
            ErrorKind::TemplateNotFound => "template not found",
            ErrorKind::BadSerialization => "could not serialize to internal format",
            ErrorKind::DuplicateRegistration => "duplicate registration",
        }
    }

    /// Returns the category of this kind.
    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorKind::SyntaxError
            | ErrorKind::UnknownTag
            | ErrorKind::UnterminatedBlock
            | ErrorKind::InvalidVariableName
            | ErrorKind::EmptyFilter
            | ErrorKind::NestingTooDeep => ErrorCategory::Syntax,
            ErrorKind::UnknownFilter
            | ErrorKind::InvalidArguments
            | ErrorKind::InvalidOperation
            | ErrorKind::TemplateNotFound
            | ErrorKind::BadSerialization => ErrorCategory::Render,
            ErrorKind::DuplicateRegistration => ErrorCategory::Configuration,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref detail) = self.detail {
            write!(f, "{}: {}", self.kind, detail)?;
        } else {
            write!(f, "{}", self.kind)?;
        }
        if let Some(ref filename) = self.name {
            write!(f, " (in {}:{})", filename, self.lineno)?
        }
        Ok(())
    }
}

impl Error {
    /// Creates a new error with kind and detail.
    pub fn new<D: Into<Cow<'static, str>>>(kind: ErrorKind, detail: D) -> Error {
        Error {
            kind,
            detail: Some(detail.into()),
            name: None,
            lineno: 0,
            source: None,
        }
    }

    pub(crate) fn set_location(&mut self, filename: &str, lineno: usize) {
        self.name = Some(filename.into());
        self.lineno = lineno;
    }

    /// Attaches another error as source to this error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error detail
    ///
    /// The detail is an error message that provides further details about
    /// the error kind.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the filename of the template that caused the error.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the line number where the error occurred.
    pub fn line(&self) -> Option<usize> {
        self.name.as_ref().map(|_| self.lineno)
    }

    /// Renders the message that is substituted into the output in lax mode.
    ///
    /// Unlike the [`Display`](std::fmt::Display) implementation this never
    /// includes the location.
    pub(crate) fn inline_message(&self) -> String {
        match self.detail {
            Some(ref detail) => format!("{}: {}", self.kind, detail),
            None => self.kind.to_string(),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|err| err.as_ref() as _)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind,
            detail: None,
            name: None,
            lineno: 0,
            source: None,
        }
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Error::new(ErrorKind::InvalidOperation, "formatting failed")
    }
}

impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Error::new(ErrorKind::BadSerialization, msg.to_string())
    }
}

#[test]
fn test_categories() {
    assert_eq!(ErrorKind::EmptyFilter.category(), ErrorCategory::Syntax);
    assert_eq!(ErrorKind::UnknownFilter.category(), ErrorCategory::Render);
    assert_eq!(
        ErrorKind::DuplicateRegistration.category(),
        ErrorCategory::Configuration
    );
}

#[test]
fn test_display_with_location() {
    let mut err = Error::new(ErrorKind::UnknownTag, "unknown tag `nope`");
    assert_eq!(err.to_string(), "unknown tag: unknown tag `nope`");
    err.set_location("hello.liquid", 3);
    assert_eq!(
        err.to_string(),
        "unknown tag: unknown tag `nope` (in hello.liquid:3)"
    );
    assert_eq!(err.inline_message(), "unknown tag: unknown tag `nope`");
}
