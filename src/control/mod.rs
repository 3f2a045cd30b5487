//! Control channel: host→device command injection and device→host
//! events (clipboard sync, command acknowledgements).

pub mod codec;
pub mod message;
pub mod stream;

pub use codec::{ControlCodec, DeviceEvent};
pub use message::{ControlMessage, CopyKey, KeyAction, MotionAction, ScreenPowerMode};
pub use stream::{ControlEvent, ControlStream};
