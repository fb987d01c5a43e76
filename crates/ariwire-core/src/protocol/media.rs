//! Media-plane control tokens.
//!
//! Text frames on a media connection carry control tokens, binary frames
//! carry audio and are never interpreted here. Tokens are matched by
//! substring, so a token may sit inside a longer notification string.

use std::fmt;

pub const MEDIA_START: &str = "MEDIA_START";
pub const MEDIA_XOFF: &str = "MEDIA_XOFF";
pub const MEDIA_XON: &str = "MEDIA_XON";
pub const MEDIA_BUFFERING_COMPLETED: &str = "MEDIA_BUFFERING_COMPLETED";
pub const START_MEDIA_BUFFERING: &str = "START_MEDIA_BUFFERING";
pub const STOP_MEDIA_BUFFERING: &str = "STOP_MEDIA_BUFFERING";
pub const HANGUP: &str = "HANGUP";

/// Parameters of a `MEDIA_START` notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaStart {
    /// `channel:<id>`; becomes the session tag.
    pub channel: Option<String>,
    /// `optimal_frame_size:<int>`; `None` when absent or not a number.
    pub optimal_frame_size: Option<u32>,
    /// Every `key:value` pair in arrival order, recognized or not.
    pub params: Vec<(String, String)>,
}

impl MediaStart {
    fn parse(text: &str) -> Self {
        let mut start = MediaStart::default();
        for word in text.split_whitespace() {
            let Some((key, value)) = word.split_once(':') else {
                continue;
            };
            match key {
                "channel" => start.channel = Some(value.to_string()),
                "optimal_frame_size" => start.optimal_frame_size = value.parse().ok(),
                _ => {}
            }
            start.params.push((key.to_string(), value.to_string()));
        }
        start
    }
}

/// Control notification received on a media connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    Start(MediaStart),
    Xoff,
    Xon,
    /// `MEDIA_BUFFERING_COMPLETED [detail]`; the detail names what finished.
    BufferingCompleted { detail: Option<String> },
    /// Anything else, kept verbatim.
    Other(String),
}

impl MediaEvent {
    pub fn parse(text: &str) -> Self {
        if text.contains(MEDIA_START) {
            return MediaEvent::Start(MediaStart::parse(text));
        }
        if text.contains(MEDIA_XOFF) {
            return MediaEvent::Xoff;
        }
        if text.contains(MEDIA_XON) {
            return MediaEvent::Xon;
        }
        if let Some((_, rest)) = text.split_once(MEDIA_BUFFERING_COMPLETED) {
            let detail = rest.split_whitespace().next().map(str::to_string);
            return MediaEvent::BufferingCompleted { detail };
        }
        MediaEvent::Other(text.to_string())
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            MediaEvent::Start(_) => MEDIA_START,
            MediaEvent::Xoff => MEDIA_XOFF,
            MediaEvent::Xon => MEDIA_XON,
            MediaEvent::BufferingCompleted { .. } => MEDIA_BUFFERING_COMPLETED,
            MediaEvent::Other(_) => "OTHER",
        }
    }
}

/// Control token sent by this side of a media connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCommand {
    StartBuffering,
    /// Closes a buffered transfer; carries the source name.
    StopBuffering(String),
    Hangup,
}

impl fmt::Display for MediaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaCommand::StartBuffering => f.write_str(START_MEDIA_BUFFERING),
            MediaCommand::StopBuffering(name) if name.is_empty() => {
                f.write_str(STOP_MEDIA_BUFFERING)
            }
            MediaCommand::StopBuffering(name) => write!(f, "{STOP_MEDIA_BUFFERING} {name}"),
            MediaCommand::Hangup => f.write_str(HANGUP),
        }
    }
}
