use std::fmt;

/// How rendered fragments are accumulated.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum OutputMode {
    /// Everything is concatenated into one string.
    Joined,
    /// Every write is kept as its own fragment.
    Fragments,
}

/// The result of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutput {
    /// All fragments concatenated into a single string.
    Joined(String),
    /// The fragments in document order.
    Fragments(Vec<String>),
}

impl RenderOutput {
    /// Returns the output as a single string, joining fragments if needed.
    pub fn into_string(self) -> String {
        match self {
            RenderOutput::Joined(rv) => rv,
            RenderOutput::Fragments(fragments) => fragments.concat(),
        }
    }

    /// Returns the fragments if the output was rendered in structured mode.
    pub fn fragments(&self) -> Option<&[String]> {
        match self {
            RenderOutput::Joined(_) => None,
            RenderOutput::Fragments(fragments) => Some(fragments),
        }
    }
}

impl fmt::Display for RenderOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderOutput::Joined(rv) => f.write_str(rv),
            RenderOutput::Fragments(fragments) => {
                for fragment in fragments {
                    ok!(f.write_str(fragment));
                }
                Ok(())
            }
        }
    }
}

/// The sink tags and blocks write into.
///
/// In joined mode all writes are appended to one string.  In structured mode
/// every call to [`write_str`](Self::write_str) produces one fragment.  While
/// a capture is active (for instance inside `capture`) writes go into the
/// capture buffer instead and never show up as fragments.
pub struct Output {
    mode: OutputMode,
    joined: String,
    fragments: Vec<String>,
    capture_stack: Vec<String>,
}

impl Output {
    pub(crate) fn new(mode: OutputMode) -> Output {
        Output {
            mode,
            joined: String::new(),
            fragments: Vec::new(),
            capture_stack: Vec::new(),
        }
    }

    /// Begins capturing into a string.
    pub fn begin_capture(&mut self) {
        self.capture_stack.push(String::new());
    }

    /// Ends the innermost capture and returns what was written.
    ///
    /// Returns an empty string if no capture is active.
    pub fn end_capture(&mut self) -> String {
        self.capture_stack.pop().unwrap_or_default()
    }

    /// Returns `true` if a capture is active.
    pub fn is_capturing(&self) -> bool {
        !self.capture_stack.is_empty()
    }

    /// Writes some data to the output.
    pub fn write_str(&mut self, s: &str) {
        if let Some(captured) = self.capture_stack.last_mut() {
            captured.push_str(s);
            return;
        }
        match self.mode {
            OutputMode::Joined => self.joined.push_str(s),
            OutputMode::Fragments => {
                if !s.is_empty() {
                    self.fragments.push(s.to_string());
                }
            }
        }
    }

    pub(crate) fn finish(mut self) -> RenderOutput {
        // captures left open by a failing handler are flushed in order
        while let Some(captured) = self.capture_stack.pop() {
            self.write_str(&captured);
        }
        match self.mode {
            OutputMode::Joined => RenderOutput::Joined(self.joined),
            OutputMode::Fragments => RenderOutput::Fragments(self.fragments),
        }
    }
}

impl fmt::Write for Output {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Output::write_str(self, s);
        Ok(())
    }
}

#[test]
fn test_capture_does_not_fragment() {
    let mut out = Output::new(OutputMode::Fragments);
    out.write_str("a");
    out.begin_capture();
    out.write_str("b");
    out.write_str("c");
    assert_eq!(out.end_capture(), "bc");
    out.write_str("");
    out.write_str("d");
    assert_eq!(
        out.finish(),
        RenderOutput::Fragments(vec!["a".into(), "d".into()])
    );
}
