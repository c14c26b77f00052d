use std::{sync::Arc, time::Duration};

use log::*;

use crate::{
    CamError, CamResult, consts,
    driver::{
        Abilities, CameraHandle, CaptureKind, Context, Driver, FileKind, NativeFilePath, NativeList,
        c_str_lossy,
    },
    event::{self, EventWait},
    listing::{self, Listing},
    reader::{CameraFile, FileStreamReader},
    result::{ResultCode, Translate},
    settings::{ListingMode, SessionSettings},
    widget::{ConfigWidget, WidgetKind},
};

/// Struct for interacting with the camera.
///
/// Owns the camera handle and its execution context. Both are created by
/// [`init`](Self::init) and destroyed together by [`exit`](Self::exit);
/// a session cannot be initialized again after it was closed.
///
/// The camera connection is serial. Apart from [`cancel`](Self::cancel) and
/// the background part of [`async_wait_for_event`](Self::async_wait_for_event),
/// calls are not meant to overlap; the session does not serialize them.
pub struct Camera {
    driver: Arc<dyn Driver>,
    settings: SessionSettings,
    state: SessionState,
}

enum SessionState {
    Uninitialized,
    Live { camera: CameraHandle, ctx: Context },
    Exited,
}

/// Location of a file on the camera storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CapturedFilePath {
    pub name: String,
    pub folder: String,
}

impl CapturedFilePath {
    pub fn from_native(path: &NativeFilePath) -> Self {
        Self {
            name: c_str_lossy(&path.name),
            folder: c_str_lossy(&path.folder),
        }
    }
}

impl std::fmt::Display for CapturedFilePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&listing::join(&self.folder, &self.name))
    }
}

/// Cancels driver calls of a session from another thread.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    ctx: Context,
}

impl CancelHandle {
    /// Requests cancellation of the call currently in flight. Advisory only.
    pub fn cancel(&self) {
        self.ctx.cancel();
    }
}

impl Camera {
    /// Creates a session with default settings.
    ///
    /// The caller should then use the `init` function,
    /// which connects to the camera.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self::new_custom(driver, SessionSettings::default())
    }

    /// Creates a session with custom settings.
    ///
    /// * `driver` - The camera driver.
    /// * `settings` - Chunk ceiling of file streams, recursive listing mode, helper timeouts.
    pub fn new_custom(driver: Arc<dyn Driver>, settings: SessionSettings) -> Self {
        Self {
            driver,
            settings,
            state: SessionState::Uninitialized,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, SessionState::Live { .. })
    }

    fn device_err(&self, code: ResultCode) -> CamError {
        code.into_error(&*self.driver)
    }

    fn live(&self) -> CamResult<(CameraHandle, &Context)> {
        match &self.state {
            SessionState::Live { camera, ctx } => Ok((*camera, ctx)),
            SessionState::Uninitialized => Err(CamError::NotInitialized),
            SessionState::Exited => Err(CamError::SessionClosed),
        }
    }

    /// Allocates the context and the camera handle and connects to the camera.
    /// The handle is released again if the connection fails.
    pub fn init(&mut self) -> CamResult<()> {
        match self.state {
            SessionState::Live { .. } => return Err(CamError::AlreadyInitialized),
            SessionState::Exited => return Err(CamError::SessionClosed),
            SessionState::Uninitialized => {}
        }

        let ctx = Context::new();
        let camera = self.driver.camera_new().translate(&*self.driver)?;

        if let Err(code) = self.driver.camera_init(camera, &ctx) {
            error!("Unable to initialize camera ({code})");

            if let Err(free_code) = self.driver.camera_free(camera) {
                warn!("Unable to free camera handle after a failed init ({free_code})");
            }

            return Err(self.device_err(code));
        }

        info!("Camera initialized successfully!");
        self.state = SessionState::Live { camera, ctx };

        Ok(())
    }

    /// Disconnects from the camera and destroys the handle and the context.
    /// The session is closed afterwards, even if the driver reports a failure.
    pub fn exit(&mut self) -> CamResult<()> {
        let (camera, ctx) = match std::mem::replace(&mut self.state, SessionState::Exited) {
            SessionState::Live { camera, ctx } => (camera, ctx),
            SessionState::Uninitialized => {
                self.state = SessionState::Uninitialized;
                return Err(CamError::NotInitialized);
            }
            SessionState::Exited => return Err(CamError::SessionClosed),
        };

        let exit_res = self.driver.camera_exit(camera, &ctx);
        let free_res = self.driver.camera_free(camera);

        if let Err(code) = exit_res {
            error!("Error while closing the camera connection ({code})");
            return Err(self.device_err(code));
        }
        free_res.translate(&*self.driver)?;

        info!("Camera connection closed");

        Ok(())
    }

    /// Signals the context to abort the blocking call in flight, e.g. an event wait.
    pub fn cancel(&self) -> CamResult<()> {
        let (_, ctx) = self.live()?;
        debug!("Cancellation requested");
        ctx.cancel();
        Ok(())
    }

    /// Handle that can cancel this session's calls from another thread.
    pub fn cancel_handle(&self) -> CamResult<CancelHandle> {
        let (_, ctx) = self.live()?;
        Ok(CancelHandle { ctx: ctx.clone() })
    }

    /// Returns the capability record of the connected camera.
    pub fn abilities(&self) -> CamResult<Abilities> {
        let (camera, _) = self.live()?;
        self.driver.camera_abilities(camera).translate(&*self.driver)
    }

    /// Returns the model name of the connected camera.
    pub fn model(&self) -> CamResult<String> {
        Ok(self.abilities()?.model)
    }

    /// Triggers a capture without transferring anything. The camera reports
    /// the new file through an event.
    pub fn trigger_capture(&self) -> CamResult<()> {
        let (camera, ctx) = self.live()?;
        self.driver
            .camera_trigger_capture(camera, ctx)
            .translate(&*self.driver)?;
        Ok(())
    }

    /// Takes a still image and stores it on the camera storage.
    ///
    /// Returns where the image was stored.
    pub fn trigger_capture_to_file(&self) -> CamResult<CapturedFilePath> {
        self.capture(CaptureKind::Image)
    }

    /// Records an image, movie or sound on the camera storage.
    ///
    /// * `kind` - What to record.
    pub fn capture(&self, kind: CaptureKind) -> CamResult<CapturedFilePath> {
        let (camera, ctx) = self.live()?;

        let native = self
            .driver
            .camera_capture(camera, kind, ctx)
            .translate(&*self.driver)?;
        let path = CapturedFilePath::from_native(&native);
        debug!("Captured {kind:?} to {path}");

        Ok(path)
    }

    /// Captures a live view frame into memory.
    pub fn capture_preview(&self) -> CamResult<CameraFile> {
        let (camera, ctx) = self.live()?;
        let file = self.driver.file_new().translate(&*self.driver)?;

        if let Err(code) = self.driver.camera_capture_preview(camera, file, ctx) {
            if let Err(free_code) = self.driver.file_free(file) {
                warn!("Unable to free preview file after a failed capture ({free_code})");
            }
            return Err(self.device_err(code));
        }

        CameraFile::adopt(self.driver.clone(), file)
    }

    /// Waits for the next camera event without blocking the caller.
    ///
    /// The native wait runs on a blocking thread and is bounded by `timeout`;
    /// when nothing happens a timeout event is delivered. The returned future
    /// resolves exactly once.
    ///
    /// A cancellation requested while no wait was running is discarded, so
    /// only [`cancel`](Self::cancel) calls made after this point end the wait.
    ///
    /// Waits are not serialized: overlapping waits on one session interleave
    /// at the driver in unspecified ways.
    pub fn async_wait_for_event(&self, timeout: Duration) -> CamResult<EventWait> {
        let (camera, ctx) = self.live()?;
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

        if ctx.take_cancel() {
            debug!("Discarding a cancellation requested before the wait");
        }

        Ok(event::spawn_wait(self.driver.clone(), camera, timeout_ms, ctx.clone()))
    }

    /// Lists the names of the direct subfolders of `path` (`"/"` when empty).
    pub fn list_folders(&self, path: &str) -> CamResult<Vec<String>> {
        let (camera, ctx) = self.live()?;
        let folder = if path.is_empty() { consts::ROOT_FOLDER } else { checked_path(path)? };

        let mut list = NativeList::new();
        self.driver
            .camera_folder_list_folders(camera, folder, &mut list, ctx)
            .translate(&*self.driver)?;

        Ok(Listing::decode(&list, &*self.driver)?.into_names())
    }

    /// Lists the names of the files in `path` (`"/"` when empty).
    pub fn list_files(&self, path: &str) -> CamResult<Vec<String>> {
        let (camera, ctx) = self.live()?;
        let folder = listing::with_trailing_separator(checked_path(path)?);

        let mut list = NativeList::new();
        self.driver
            .camera_folder_list_files(camera, &folder, &mut list, ctx)
            .translate(&*self.driver)?;

        Ok(Listing::decode(&list, &*self.driver)?.into_names())
    }

    /// Lists every folder below `path` as full paths, using the session's listing mode.
    pub fn list_folders_recursive(&self, path: &str) -> CamResult<Vec<String>> {
        self.list_folders_recursive_with(path, self.settings.listing_mode)
    }

    /// Lists every folder below `path` as full paths.
    ///
    /// The direct subfolders of a folder are listed before descending into
    /// each of them. With [`ListingMode::BestEffort`] folders that fail to
    /// list are skipped.
    ///
    /// * `path` - The starting folder.
    /// * `mode` - Failure handling below the starting folder.
    pub fn list_folders_recursive_with(&self, path: &str, mode: ListingMode) -> CamResult<Vec<String>> {
        self.live()?;

        let mut folders = Vec::new();
        self.collect_folders(checked_path(path)?, mode, &mut folders)?;

        Ok(folders)
    }

    fn collect_folders(&self, path: &str, mode: ListingMode, out: &mut Vec<String>) -> CamResult<()> {
        let base = listing::with_trailing_separator(path);

        let subfolders = match self.list_folders(&base) {
            Ok(subfolders) => subfolders,
            Err(e) if mode == ListingMode::BestEffort => {
                warn!("Skipping {base} while listing folders ({e})");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let sub_paths: Vec<String> = subfolders
            .iter()
            .filter(|sub| {
                let usable = !sub.trim_matches(consts::PATH_SEPARATOR).is_empty();
                if !usable {
                    warn!("Ignoring subfolder {sub:?} of {base}");
                }
                usable
            })
            .map(|sub| listing::join(&base, sub))
            .collect();

        out.extend(sub_paths.iter().cloned());

        for sub_path in &sub_paths {
            self.collect_folders(sub_path, mode, out)?;
        }

        Ok(())
    }

    /// Fetches one representation of a stored file into memory.
    ///
    /// * `folder` - Folder of the file.
    /// * `name` - File name.
    /// * `kind` - Representation to fetch (normal, raw, preview, ...).
    pub fn fetch_file(&self, folder: &str, name: &str, kind: FileKind) -> CamResult<CameraFile> {
        let (camera, ctx) = self.live()?;
        let (folder, name) = (checked_path(folder)?, checked_path(name)?);

        let file = self.driver.file_new().translate(&*self.driver)?;

        if let Err(code) = self.driver.camera_file_get(camera, folder, name, kind, file, ctx) {
            if let Err(free_code) = self.driver.file_free(file) {
                warn!("Unable to free camera file after a failed fetch ({free_code})");
            }
            return Err(self.device_err(code));
        }

        CameraFile::adopt(self.driver.clone(), file)
    }

    /// Fetches a stored file completely into memory and returns a chunked reader over it.
    pub fn file_reader(&self, folder: &str, name: &str) -> CamResult<FileStreamReader> {
        let file = self.fetch_file(folder, name, FileKind::Normal)?;
        debug!("Fetched {name} from {folder} ({} bytes)", file.size());

        Ok(file.into_reader(self.settings.chunk_cap))
    }

    /// Deletes a file from the camera storage.
    pub fn delete_file(&self, folder: &str, name: &str) -> CamResult<()> {
        let (camera, ctx) = self.live()?;
        self.driver
            .camera_file_delete(camera, checked_path(folder)?, checked_path(name)?, ctx)
            .translate(&*self.driver)?;
        Ok(())
    }

    /// Reads the whole configuration tree. The returned widget is its root.
    pub fn get_config(&self) -> CamResult<ConfigWidget> {
        let (camera, ctx) = self.live()?;
        let root = self
            .driver
            .widget_new(WidgetKind::Window, consts::CONFIG_ROOT_LABEL)
            .translate(&*self.driver)?;

        if let Err(code) = self.driver.camera_get_config(camera, root, ctx) {
            if let Err(free_code) = self.driver.widget_free(root) {
                warn!("Unable to free configuration root after a failed read ({free_code})");
            }
            return Err(self.device_err(code));
        }

        Ok(ConfigWidget::new_root(self.driver.clone(), root))
    }

    /// Pushes a configuration tree (or a single widget of it) to the camera.
    pub fn set_config(&self, widget: &ConfigWidget) -> CamResult<()> {
        let (camera, ctx) = self.live()?;
        self.driver
            .camera_set_config(camera, widget.live_handle()?, ctx)
            .translate(&*self.driver)?;
        Ok(())
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if self.is_live() {
            if let Err(e) = self.exit() {
                warn!("Error while closing the camera session on drop ({e})");
            }
        }
    }
}

fn checked_path(path: &str) -> CamResult<&str> {
    if path.contains('\0') {
        return Err(CamError::InvalidPath(path.to_owned()));
    }
    Ok(path)
}
