//! Media plane: flow control and relay strategies.
//!
//! - `gate`: the send gate (binary semaphore held across XOFF/XON)
//! - `flow`: control-token state machine
//! - `playback`: chunked source playback
//! - `relay`: per-connection read loop and the strategy seam
//! - `echo`, `verify`, `proxy`: the three strategies

pub mod echo;
pub mod flow;
pub mod gate;
pub mod playback;
pub mod proxy;
pub mod relay;
pub mod session;
pub mod verify;

pub use flow::{FlowAction, FlowControl, FlowState};
pub use gate::SendGate;
pub use playback::{play, play_file, PlaybackReport};
pub use proxy::{forward_policy, ForwardPolicy};
pub use relay::{run_media_session, RelayCx, RelayStrategy};
pub use session::{MediaSession, MediaSettings};
pub use verify::{AudioLog, EchoVerdict};
