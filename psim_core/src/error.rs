use psim_schema::Milliseconds;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimErrorKind {
    /// Malformed note input, rejected before any run starts.
    Validation,
    /// Bad skill level, sweep range or simulator option.
    Parameter,
    /// Builder/simulator bug. The current run is aborted.
    Invariant,
}

impl SimErrorKind {
    pub(crate) fn from_code(code: &'static str) -> Self {
        match code {
            "E1001" | "E1002" | "E1003" | "E1004" | "E1005" | "E1006" | "E1007" => Self::Validation,

            "E1101" | "E1102" | "E1103" => Self::Parameter,

            "E9001" | "E9002" | "E9003" | "E9004" => Self::Invariant,

            // Unknown codes only come from new call sites; treat as bugs.
            _ => Self::Invariant,
        }
    }
}

#[derive(Debug, Error, Clone)]
#[error("{code}: {message}")]
pub struct SimError {
    pub code: &'static str,
    pub kind: SimErrorKind,
    pub message: String,

    pub channel: Option<usize>,
    pub event: Option<usize>,
    pub time_ms: Option<Milliseconds>,
    pub context: Option<String>,
}

impl SimError {
    pub(crate) fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: SimErrorKind::from_code(code),
            message: message.into(),

            channel: None,
            event: None,
            time_ms: None,
            context: None,
        }
    }

    pub fn with_channel(mut self, channel: usize) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_event(mut self, event: usize) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_time_ms(mut self, time_ms: Milliseconds) -> Self {
        self.time_ms = Some(time_ms);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == SimErrorKind::Invariant
    }
}
