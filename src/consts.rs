use std::time::Duration;

/// Maximum number of bytes a single `FileStreamReader::read` call copies.
/// Bounds one call only, callers keep reading until end of stream.
pub const DEFAULT_CHUNK_CAP: usize = 1024 * 1024;

/// Native wait bound used by `CamUtil` helpers when the caller gives none.
pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Interval at which the mock driver checks for cancellation while waiting.
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Storage root of every camera.
pub const ROOT_FOLDER: &str = "/";

/// Separator between storage path segments.
pub const PATH_SEPARATOR: char = '/';

/// Width of the name field of a native camera file path, NUL included.
pub const FILE_PATH_NAME_LEN: usize = 128;

/// Width of the folder field of a native camera file path, NUL included.
pub const FILE_PATH_FOLDER_LEN: usize = 1024;

/// Label of the root "window" widget allocated before fetching the configuration.
pub const CONFIG_ROOT_LABEL: &str = "";

/// Name of the thread used for event waits when no tokio runtime is running.
pub const EVENT_THREAD_NAME: &str = "tether-cam-event";
