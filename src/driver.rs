//! Everything the crate needs from a camera driver.
//!
//! The [`Driver`] trait mirrors the call shape of a gphoto-style C library:
//! every call reports a [`ResultCode`] and fills its outputs only on success.
//! Handles are opaque numbers minted by the driver. The crate never hands them
//! to its callers.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use bytes::Bytes;

use crate::{consts, result::ResultCode, widget::WidgetKind};

/// Result of a driver call.
pub type NativeResult<T> = Result<T, ResultCode>;

/// Opaque camera handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraHandle(pub u64);

/// Opaque handle of an in-memory camera file object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u64);

/// Opaque handle of a configuration widget node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetHandle(pub u64);

/// Execution context passed to long-running driver calls.
///
/// Clones share the same cancellation flag, so a clone can be moved to
/// another thread and used to interrupt a call that is in flight.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: Arc<AtomicBool>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Advisory, the driver decides when to look.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Consumes a pending cancellation request. Drivers call this when they
    /// abort a call so that the next call starts clean.
    pub fn take_cancel(&self) -> bool {
        self.cancel.swap(false, Ordering::SeqCst)
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, int_enum::IntEnum)]
/// What a capture call records.
pub enum CaptureKind {
    Image = 0,
    Movie = 1,
    Sound = 2,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, int_enum::IntEnum)]
/// Which representation of a stored file to fetch.
pub enum FileKind {
    Preview = 0,
    Normal = 1,
    Raw = 2,
    Audio = 3,
    Exif = 4,
    Metadata = 5,
}

/// Native event type tags.
pub mod event_tag {
    pub const UNKNOWN: i32 = 0;
    pub const TIMEOUT: i32 = 1;
    pub const FILE_ADDED: i32 = 2;
    pub const FOLDER_ADDED: i32 = 3;
    pub const CAPTURE_COMPLETE: i32 = 4;
}

/// Capability record of a camera model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Abilities {
    pub model: String,
    pub capture_image: bool,
    pub capture_video: bool,
    pub capture_audio: bool,
    pub capture_preview: bool,
    pub trigger_capture: bool,
    pub config: bool,
}

/// Native file path record with fixed-width, NUL-padded fields.
#[derive(Clone, PartialEq, Eq)]
pub struct NativeFilePath {
    pub name: [u8; consts::FILE_PATH_NAME_LEN],
    pub folder: [u8; consts::FILE_PATH_FOLDER_LEN],
}

impl NativeFilePath {
    /// Builds a record, truncating each field so that it stays NUL-terminated.
    pub fn new(folder: &str, name: &str) -> Self {
        let mut path = Self {
            name: [0; consts::FILE_PATH_NAME_LEN],
            folder: [0; consts::FILE_PATH_FOLDER_LEN],
        };

        copy_truncated(&mut path.name, name.as_bytes());
        copy_truncated(&mut path.folder, folder.as_bytes());

        path
    }

    /// Raw layout used as an event payload: name field followed by folder field.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(consts::FILE_PATH_NAME_LEN + consts::FILE_PATH_FOLDER_LEN);
        buf.extend_from_slice(&self.name);
        buf.extend_from_slice(&self.folder);
        buf
    }
}

impl std::fmt::Debug for NativeFilePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFilePath")
            .field("name", &c_str_lossy(&self.name))
            .field("folder", &c_str_lossy(&self.folder))
            .finish()
    }
}

fn copy_truncated(dst: &mut [u8], src: &[u8]) {
    let len = src.len().min(dst.len() - 1);
    dst[..len].copy_from_slice(&src[..len]);
}

/// Reads a NUL-terminated string out of a fixed-width field.
pub(crate) fn c_str_lossy(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Event as reported by the driver: a type tag and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub tag: i32,
    pub payload: Option<Box<[u8]>>,
}

/// Native name/value list filled by listing calls.
#[derive(Debug, Clone, Default)]
pub struct NativeList {
    entries: Vec<(String, Option<String>)>,
}

impl NativeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: Option<String>) {
        self.entries.push((name.into(), value));
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn name(&self, index: usize) -> NativeResult<&str> {
        self.entries
            .get(index)
            .map(|(name, _)| name.as_str())
            .ok_or(ResultCode::BAD_PARAMETERS)
    }

    pub fn value(&self, index: usize) -> NativeResult<Option<&str>> {
        self.entries
            .get(index)
            .map(|(_, value)| value.as_deref())
            .ok_or(ResultCode::BAD_PARAMETERS)
    }
}

/// Value as stored by a native widget node.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// Text, radio and menu widgets.
    Text(String),
    /// Range widgets.
    Float(f32),
    /// Toggle and date widgets.
    Int(i32),
}

/// Static description of a widget node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetInfo {
    pub name: String,
    pub label: String,
    pub kind: WidgetKind,
}

/// Calls into the camera driver library.
///
/// Implementations must be thread safe: the event wait runs on a blocking
/// thread and cancellation may come from yet another one.
pub trait Driver: Send + Sync + 'static {
    fn camera_new(&self) -> NativeResult<CameraHandle>;
    fn camera_init(&self, camera: CameraHandle, ctx: &Context) -> NativeResult<()>;
    fn camera_exit(&self, camera: CameraHandle, ctx: &Context) -> NativeResult<()>;
    fn camera_free(&self, camera: CameraHandle) -> NativeResult<()>;
    fn camera_abilities(&self, camera: CameraHandle) -> NativeResult<Abilities>;

    fn camera_trigger_capture(&self, camera: CameraHandle, ctx: &Context) -> NativeResult<()>;
    fn camera_capture(
        &self,
        camera: CameraHandle,
        kind: CaptureKind,
        ctx: &Context,
    ) -> NativeResult<NativeFilePath>;
    fn camera_capture_preview(
        &self,
        camera: CameraHandle,
        file: FileHandle,
        ctx: &Context,
    ) -> NativeResult<()>;

    /// Blocks until the next event or until `timeout_ms` elapses, in which
    /// case a timeout event is returned.
    fn camera_wait_for_event(
        &self,
        camera: CameraHandle,
        timeout_ms: i32,
        ctx: &Context,
    ) -> NativeResult<RawEvent>;

    fn camera_folder_list_folders(
        &self,
        camera: CameraHandle,
        folder: &str,
        list: &mut NativeList,
        ctx: &Context,
    ) -> NativeResult<()>;
    fn camera_folder_list_files(
        &self,
        camera: CameraHandle,
        folder: &str,
        list: &mut NativeList,
        ctx: &Context,
    ) -> NativeResult<()>;

    fn camera_file_get(
        &self,
        camera: CameraHandle,
        folder: &str,
        name: &str,
        kind: FileKind,
        file: FileHandle,
        ctx: &Context,
    ) -> NativeResult<()>;
    fn camera_file_delete(
        &self,
        camera: CameraHandle,
        folder: &str,
        name: &str,
        ctx: &Context,
    ) -> NativeResult<()>;

    /// Populates the tree rooted at `root` with the device configuration.
    fn camera_get_config(
        &self,
        camera: CameraHandle,
        root: WidgetHandle,
        ctx: &Context,
    ) -> NativeResult<()>;
    fn camera_set_config(
        &self,
        camera: CameraHandle,
        widget: WidgetHandle,
        ctx: &Context,
    ) -> NativeResult<()>;

    fn file_new(&self) -> NativeResult<FileHandle>;
    /// Data buffer of a file object. Lives as long as the file object.
    fn file_data_and_size(&self, file: FileHandle) -> NativeResult<Bytes>;
    fn file_free(&self, file: FileHandle) -> NativeResult<()>;

    fn widget_new(&self, kind: WidgetKind, label: &str) -> NativeResult<WidgetHandle>;
    /// Frees the node together with every descendant.
    fn widget_free(&self, widget: WidgetHandle) -> NativeResult<()>;
    fn widget_info(&self, widget: WidgetHandle) -> NativeResult<WidgetInfo>;
    /// Searches the descendants of `widget` for one with the given name.
    fn widget_child_by_name(&self, widget: WidgetHandle, name: &str) -> NativeResult<WidgetHandle>;
    fn widget_count_children(&self, widget: WidgetHandle) -> NativeResult<usize>;
    fn widget_child(&self, widget: WidgetHandle, index: usize) -> NativeResult<WidgetHandle>;
    fn widget_value(&self, widget: WidgetHandle) -> NativeResult<Option<NativeValue>>;
    fn widget_set_value(&self, widget: WidgetHandle, value: &NativeValue) -> NativeResult<()>;
    fn widget_choices(&self, widget: WidgetHandle) -> NativeResult<Vec<String>>;
    /// Minimum, maximum and step of a range widget.
    fn widget_range(&self, widget: WidgetHandle) -> NativeResult<(f32, f32, f32)>;

    fn result_as_string(&self, code: ResultCode) -> &'static str {
        code.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_path_fields_stay_terminated() {
        let long_name = "x".repeat(500);
        let path = NativeFilePath::new("/DCIM/100CANON", &long_name);

        assert_eq!(path.name[consts::FILE_PATH_NAME_LEN - 1], 0);
        assert_eq!(c_str_lossy(&path.name).len(), consts::FILE_PATH_NAME_LEN - 1);
        assert_eq!(c_str_lossy(&path.folder), "/DCIM/100CANON");
    }

    #[test]
    fn take_cancel_resets_the_flag() {
        let ctx = Context::new();
        let remote = ctx.clone();

        remote.cancel();

        assert!(ctx.is_cancelled());
        assert!(ctx.take_cancel());
        assert!(!remote.is_cancelled());
        assert!(!ctx.take_cancel());
    }

    #[test]
    fn list_out_of_range_is_bad_parameters() {
        let mut list = NativeList::new();
        list.append("DCIM", None);

        assert_eq!(list.name(0), Ok("DCIM"));
        assert_eq!(list.value(0), Ok(None));
        assert_eq!(list.name(1), Err(ResultCode::BAD_PARAMETERS));
    }
}
