pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_LICENSE_PATH: &str = "test.license";
pub const DEFAULT_OUTPUT_PATH: &str = "output.csv";

pub const DEFAULT_CAMERA_ID: u32 = 0;
pub const DEFAULT_CAMERA_FPS: f64 = 30.0;
pub const DEFAULT_PROCESSING_FPS: f64 = 30.0;
pub const DEFAULT_MAX_FACES: usize = 1;

/// Envelopes buffered before the oldest is evicted (~2 seconds at 30 fps).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Samples kept per role by the frame-rate tracker (~1 second at 30 fps).
pub const FRAME_RATE_WINDOW: usize = 30;

/// Bounded wait used by the consumer when it is not busy-spinning.
pub const DEFAULT_POLL_WAIT_MS: u64 = 5;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Synthetic camera frame size.
pub const SYNTHETIC_FRAME_WIDTH: u32 = 320;
pub const SYNTHETIC_FRAME_HEIGHT: u32 = 240;

/// Rendered frames between overlay snapshots.
pub const DEFAULT_SNAPSHOT_EVERY: usize = 30;
