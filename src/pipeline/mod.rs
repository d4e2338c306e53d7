pub mod camera;
pub mod controller;
pub mod inference;
pub mod overlay;
pub mod rgba_converter;
pub mod scheduler;

// Re-exports for convenience
pub use camera::NokhwaSource;
pub use controller::{CaptureController, DisplaySurface, TickOutcome};
pub use inference::HttpInferenceClient;
pub use overlay::OverlayRenderer;
