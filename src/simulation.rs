//! Decoding of the installer's simulation-mode output stream.
//!
//! Tagged lines look like `simulated: <command>`. Anything before the first
//! tagged line is preamble noise; after it, the stream is consumed one line
//! per expected action.

/// Marker that opens every simulated action line.
pub const SIMULATION_TAG: &str = "simulated";
/// Characters between the tag and the command text (`": "`).
const SEPARATOR_LEN: usize = 2;

/// One simulated action, as printed by the installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action<'a> {
    /// The whole line, whitespace-trimmed.
    pub line: &'a str,
    /// Command text with the tag and separator stripped.
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine<'a> {
    Preamble(&'a str),
    Action(Action<'a>),
}

pub fn classify_line(raw: &str) -> OutputLine<'_> {
    let line = raw.trim();
    match line.strip_prefix(SIMULATION_TAG) {
        Some(rest) => OutputLine::Action(Action {
            line,
            command: rest.chars().skip(SEPARATOR_LEN).collect(),
        }),
        None => OutputLine::Preamble(line),
    }
}

/// The stream ran out before the check it was needed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted {
    /// Lines consumed before running out.
    pub consumed: usize,
}

/// Bounded cursor over captured output lines.
#[derive(Debug, Clone)]
pub struct OutputCursor<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> OutputCursor<'a> {
    pub fn new(output: &'a str) -> Self {
        Self {
            lines: output.lines().collect(),
            pos: 0,
        }
    }

    /// Skip preamble and return the first tagged line.
    pub fn seek_first_action(&mut self) -> Result<Action<'a>, Exhausted> {
        while let Some(raw) = self.lines.get(self.pos).copied() {
            self.pos += 1;
            if let OutputLine::Action(action) = classify_line(raw) {
                return Ok(action);
            }
        }
        Err(self.exhausted())
    }

    /// Take the next line, tagged or not.
    pub fn next_line(&mut self) -> Result<OutputLine<'a>, Exhausted> {
        let raw = self
            .lines
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.exhausted())?;
        self.pos += 1;
        Ok(classify_line(raw))
    }

    fn exhausted(&self) -> Exhausted {
        Exhausted {
            consumed: self.pos,
        }
    }
}
