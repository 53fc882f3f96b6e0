mod panner;
mod transform;
mod viewport;

pub use panner::{GestureConfig, PanMode, Panner, PointerInput, PointerKind, WheelDelta};
pub use transform::{ViewTransform, ViewportError};
pub use viewport::{ScaleLimits, ViewportState, WheelOutcome};
