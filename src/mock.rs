//! In-memory camera driver.
//!
//! Simulates one camera with a storage tree, an event queue and a
//! configuration tree. Failures can be injected per operation and every
//! free is counted, which makes ownership bugs (double frees, leaks) visible
//! in tests.

use std::{
    collections::{HashMap, VecDeque},
    time::Instant,
};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{
    consts,
    driver::{
        Abilities, CameraHandle, CaptureKind, Context, Driver, FileHandle, FileKind, NativeFilePath,
        NativeList, NativeResult, NativeValue, RawEvent, WidgetHandle, WidgetInfo, event_tag,
    },
    result::ResultCode,
    widget::WidgetKind,
};

/// Folder new captures are stored in.
pub const CAPTURE_FOLDER: &str = "/store_00010001/DCIM/100MOCK";

/// Default model reported by the mock camera.
pub const MOCK_MODEL: &str = "Mock Camera EOS 1000D";

/// Driver operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    CameraNew,
    Init,
    Exit,
    Abilities,
    TriggerCapture,
    Capture,
    CapturePreview,
    WaitForEvent,
    ListFolders,
    ListFiles,
    FileGet,
    FileDelete,
    GetConfig,
    SetConfig,
    WidgetNew,
}

/// Counters of calls that release or push native resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStats {
    pub camera_frees: usize,
    pub file_frees: usize,
    pub widget_frees: usize,
    pub set_config_calls: usize,
    pub event_waits: usize,
}

/// Template node of the simulated configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub struct MockWidget {
    pub name: String,
    pub label: String,
    pub kind: WidgetKind,
    pub value: Option<NativeValue>,
    pub choices: Vec<String>,
    pub range: (f32, f32, f32),
    pub children: Vec<MockWidget>,
}

impl MockWidget {
    fn node(kind: WidgetKind, name: &str, label: &str, value: Option<NativeValue>) -> Self {
        Self {
            name: name.to_owned(),
            label: label.to_owned(),
            kind,
            value,
            choices: Vec::new(),
            range: (0.0, 0.0, 0.0),
            children: Vec::new(),
        }
    }

    pub fn window(name: &str, label: &str) -> Self {
        Self::node(WidgetKind::Window, name, label, None)
    }

    pub fn section(name: &str, label: &str) -> Self {
        Self::node(WidgetKind::Section, name, label, None)
    }

    pub fn text(name: &str, label: &str, value: &str) -> Self {
        Self::node(WidgetKind::Text, name, label, Some(NativeValue::Text(value.to_owned())))
    }

    pub fn radio(name: &str, label: &str, value: &str, choices: &[&str]) -> Self {
        let mut widget = Self::node(WidgetKind::Radio, name, label, Some(NativeValue::Text(value.to_owned())));
        widget.choices = choices.iter().map(|c| (*c).to_owned()).collect();
        widget
    }

    pub fn menu(name: &str, label: &str, value: &str, choices: &[&str]) -> Self {
        let mut widget = Self::radio(name, label, value, choices);
        widget.kind = WidgetKind::Menu;
        widget
    }

    pub fn range(name: &str, label: &str, value: f32, min: f32, max: f32, step: f32) -> Self {
        let mut widget = Self::node(WidgetKind::Range, name, label, Some(NativeValue::Float(value)));
        widget.range = (min, max, step);
        widget
    }

    pub fn toggle(name: &str, label: &str, on: bool) -> Self {
        Self::node(WidgetKind::Toggle, name, label, Some(NativeValue::Int(i32::from(on))))
    }

    pub fn date(name: &str, label: &str, timestamp: i32) -> Self {
        Self::node(WidgetKind::Date, name, label, Some(NativeValue::Int(timestamp)))
    }

    pub fn button(name: &str, label: &str) -> Self {
        Self::node(WidgetKind::Button, name, label, None)
    }

    pub fn child(mut self, child: MockWidget) -> Self {
        self.children.push(child);
        self
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut MockWidget> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(name))
    }

    fn find(&self, name: &str) -> Option<&MockWidget> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

/// Configuration tree of the default mock camera.
pub fn default_config() -> MockWidget {
    MockWidget::window("main", "Camera and Driver Configuration")
        .child(
            MockWidget::section("actions", "Camera Actions")
                .child(MockWidget::button("autofocusdrive", "Drive Canon DSLR Autofocus"))
                .child(MockWidget::toggle("viewfinder", "Canon EOS Viewfinder", false)),
        )
        .child(
            MockWidget::section("settings", "Camera Settings")
                .child(MockWidget::date("datetime", "Camera Date and Time", 1_700_000_000))
                .child(MockWidget::text("artist", "Artist", "")),
        )
        .child(
            MockWidget::section("imgsettings", "Image Settings")
                .child(MockWidget::radio(
                    "iso",
                    "ISO Speed",
                    "100",
                    &["Auto", "100", "200", "400", "800", "1600", "3200"],
                ))
                .child(MockWidget::radio(
                    "whitebalance",
                    "WhiteBalance",
                    "Auto",
                    &["Auto", "Daylight", "Shadow", "Cloudy", "Tungsten", "Fluorescent"],
                ))
                .child(MockWidget::menu(
                    "imageformat",
                    "Image Format",
                    "Large Fine JPEG",
                    &["Large Fine JPEG", "Small Normal JPEG", "RAW", "RAW + Large Fine JPEG"],
                )),
        )
        .child(
            MockWidget::section("capturesettings", "Capture Settings")
                .child(MockWidget::radio("aperture", "Aperture", "5.6", &["4", "5.6", "8", "11"]))
                .child(MockWidget::range(
                    "exposurecompensation",
                    "Exposure Compensation",
                    0.0,
                    -3.0,
                    3.0,
                    1.0 / 3.0,
                )),
        )
}

#[derive(Debug)]
struct WidgetNode {
    info: WidgetInfo,
    value: Option<NativeValue>,
    choices: Vec<String>,
    range: (f32, f32, f32),
    children: Vec<u64>,
}

#[derive(Debug)]
struct MockState {
    next_id: u64,
    cameras: HashMap<u64, bool>,
    files: HashMap<u64, Bytes>,
    widgets: HashMap<u64, WidgetNode>,
    /// Folder paths in creation order, root excluded.
    folders: Vec<String>,
    stored: HashMap<String, Vec<(String, Bytes)>>,
    events: VecDeque<RawEvent>,
    config: MockWidget,
    abilities: Abilities,
    preview: Bytes,
    capture_size: usize,
    captures: u32,
    failures: HashMap<MockOp, ResultCode>,
    folder_failures: HashMap<String, ResultCode>,
    /// Subfolder names reported verbatim, without a backing folder.
    raw_entries: HashMap<String, Vec<String>>,
    /// Driver-specific result descriptions, consulted before the built-in table.
    messages: HashMap<ResultCode, &'static str>,
    stats: MockStats,
}

impl MockState {
    fn mint(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, op: MockOp) -> NativeResult<()> {
        match self.failures.get(&op) {
            Some(code) => Err(*code),
            None => Ok(()),
        }
    }

    fn check_camera(&self, camera: CameraHandle) -> NativeResult<()> {
        match self.cameras.get(&camera.0) {
            Some(true) => Ok(()),
            _ => Err(ResultCode::BAD_PARAMETERS),
        }
    }

    fn add_folder(&mut self, path: &str) {
        let path = normalize(path);
        if path == consts::ROOT_FOLDER {
            return;
        }

        self.add_folder(parent(&path));

        if !self.folders.contains(&path) {
            self.folders.push(path);
        }
    }

    fn folder_exists(&self, path: &str) -> bool {
        path == consts::ROOT_FOLDER || self.folders.iter().any(|f| f == path)
    }

    fn store(&mut self, folder: &str, name: &str, data: Bytes) {
        let folder = normalize(folder);
        self.add_folder(&folder);

        let files = self.stored.entry(folder).or_default();
        match files.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = data,
            None => files.push((name.to_owned(), data)),
        }
    }

    fn next_capture(&mut self) -> (String, String) {
        self.captures += 1;

        let name = format!("capt{:04}.jpg", self.captures);
        let data = synthetic_jpeg(self.capture_size, self.captures);

        self.store(CAPTURE_FOLDER, &name, data);

        (CAPTURE_FOLDER.to_owned(), name)
    }

    fn instantiate(&mut self, template: &MockWidget) -> u64 {
        let id = self.mint();
        let children: Vec<u64> = template
            .children
            .iter()
            .map(|child| self.instantiate(child))
            .collect();

        self.widgets.insert(
            id,
            WidgetNode {
                info: WidgetInfo {
                    name: template.name.clone(),
                    label: template.label.clone(),
                    kind: template.kind,
                },
                value: template.value.clone(),
                choices: template.choices.clone(),
                range: template.range,
                children,
            },
        );

        id
    }

    fn remove_subtree(&mut self, id: u64) {
        if let Some(node) = self.widgets.remove(&id) {
            for child in node.children {
                self.remove_subtree(child);
            }
        }
    }

    fn find_descendant(&self, id: u64, name: &str) -> Option<u64> {
        let node = self.widgets.get(&id)?;

        for &child in &node.children {
            if self.widgets.get(&child).is_some_and(|c| c.info.name == name) {
                return Some(child);
            }
            if let Some(found) = self.find_descendant(child, name) {
                return Some(found);
            }
        }

        None
    }

    fn collect_values(&self, id: u64, out: &mut Vec<(String, NativeValue)>) {
        let Some(node) = self.widgets.get(&id) else {
            return;
        };

        if let Some(value) = &node.value {
            out.push((node.info.name.clone(), value.clone()));
        }
        for &child in &node.children {
            self.collect_values(child, out);
        }
    }

    fn widget(&self, widget: WidgetHandle) -> NativeResult<&WidgetNode> {
        self.widgets.get(&widget.0).ok_or(ResultCode::BAD_PARAMETERS)
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches(consts::PATH_SEPARATOR);
    if trimmed.is_empty() {
        consts::ROOT_FOLDER.to_owned()
    } else {
        trimmed.to_owned()
    }
}

fn parent(path: &str) -> &str {
    match path.rfind(consts::PATH_SEPARATOR) {
        Some(0) | None => consts::ROOT_FOLDER,
        Some(idx) => &path[..idx],
    }
}

/// JPEG-looking buffer of `size` bytes whose content depends on `seed`.
fn synthetic_jpeg(size: usize, seed: u32) -> Bytes {
    let size = size.max(4);
    let mut data: Vec<u8> = (0..size).map(|i| (i as u32).wrapping_mul(31).wrapping_add(seed) as u8).collect();
    data[..2].copy_from_slice(&[0xFF, 0xD8]);
    data[size - 2..].copy_from_slice(&[0xFF, 0xD9]);
    Bytes::from(data)
}

/// Simulated camera driver.
#[derive(Debug)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// A camera with an empty storage card, the default configuration tree
    /// and 64 KiB captures.
    pub fn new() -> Self {
        let state = MockState {
            next_id: 0,
            cameras: HashMap::new(),
            files: HashMap::new(),
            widgets: HashMap::new(),
            folders: Vec::new(),
            stored: HashMap::new(),
            events: VecDeque::new(),
            config: default_config(),
            abilities: Abilities {
                model: MOCK_MODEL.to_owned(),
                capture_image: true,
                capture_video: false,
                capture_audio: false,
                capture_preview: true,
                trigger_capture: true,
                config: true,
            },
            preview: synthetic_jpeg(16 * 1024, 0),
            capture_size: 64 * 1024,
            captures: 0,
            failures: HashMap::new(),
            folder_failures: HashMap::new(),
            raw_entries: HashMap::new(),
            messages: HashMap::new(),
            stats: MockStats::default(),
        };

        Self {
            state: Mutex::new(state),
        }
    }

    /// Adds a folder and all of its ancestors.
    pub fn with_folder(self, path: &str) -> Self {
        self.state.lock().add_folder(path);
        self
    }

    /// Stores a file, creating its folder if needed.
    pub fn with_file(self, folder: &str, name: &str, data: impl Into<Bytes>) -> Self {
        self.state.lock().store(folder, name, data.into());
        self
    }

    pub fn with_model(self, model: &str) -> Self {
        self.state.lock().abilities.model = model.to_owned();
        self
    }

    pub fn with_config(self, config: MockWidget) -> Self {
        self.state.lock().config = config;
        self
    }

    pub fn with_preview(self, data: impl Into<Bytes>) -> Self {
        self.state.lock().preview = data.into();
        self
    }

    pub fn with_capture_size(self, size: usize) -> Self {
        self.state.lock().capture_size = size;
        self
    }

    /// Lists `name` as a subfolder of `folder` exactly as given, the way a
    /// misbehaving device would.
    pub fn with_raw_folder_entry(self, folder: &str, name: &str) -> Self {
        self.state
            .lock()
            .raw_entries
            .entry(normalize(folder))
            .or_default()
            .push(name.to_owned());
        self
    }

    /// Reports `message` as the description of `code`.
    pub fn with_message(self, code: ResultCode, message: &'static str) -> Self {
        self.state.lock().messages.insert(code, message);
        self
    }

    /// Makes every following call of `op` fail with `code`.
    pub fn fail(&self, op: MockOp, code: ResultCode) {
        self.state.lock().failures.insert(op, code);
    }

    pub fn clear_failure(&self, op: MockOp) {
        self.state.lock().failures.remove(&op);
    }

    /// Makes listing calls on one folder fail with `code`.
    pub fn fail_folder(&self, folder: &str, code: ResultCode) {
        self.state.lock().folder_failures.insert(normalize(folder), code);
    }

    /// Queues an event for the next wait.
    pub fn push_event(&self, event: RawEvent) {
        self.state.lock().events.push_back(event);
    }

    pub fn push_file_added(&self, folder: &str, name: &str) {
        self.push_event(RawEvent {
            tag: event_tag::FILE_ADDED,
            payload: Some(NativeFilePath::new(folder, name).to_bytes().into_boxed_slice()),
        });
    }

    pub fn stats(&self) -> MockStats {
        self.state.lock().stats.clone()
    }

    /// File objects that were allocated and not freed yet.
    pub fn live_files(&self) -> usize {
        self.state.lock().files.len()
    }

    /// Widget nodes that were allocated and not freed yet.
    pub fn live_widgets(&self) -> usize {
        self.state.lock().widgets.len()
    }

    pub fn has_file(&self, folder: &str, name: &str) -> bool {
        self.state
            .lock()
            .stored
            .get(&normalize(folder))
            .is_some_and(|files| files.iter().any(|(n, _)| n == name))
    }

    /// Value stored on the device for a configuration entry.
    pub fn device_value(&self, name: &str) -> Option<NativeValue> {
        self.state.lock().config.find(name).and_then(|w| w.value.clone())
    }

    /// Loads data into a file object, as a driver fetch would.
    pub fn load_file(&self, file: FileHandle, data: impl Into<Bytes>) -> NativeResult<()> {
        let mut state = self.state.lock();
        let slot = state.files.get_mut(&file.0).ok_or(ResultCode::BAD_PARAMETERS)?;
        *slot = data.into();
        Ok(())
    }

    fn list(
        &self,
        camera: CameraHandle,
        folder: &str,
        op: MockOp,
        list: &mut NativeList,
    ) -> NativeResult<()> {
        let state = self.state.lock();
        state.check(op)?;
        state.check_camera(camera)?;

        let folder = normalize(folder);
        if let Some(code) = state.folder_failures.get(&folder) {
            return Err(*code);
        }
        if !state.folder_exists(&folder) {
            return Err(ResultCode::DIRECTORY_NOT_FOUND);
        }

        match op {
            MockOp::ListFolders => {
                for sub in state.folders.iter().filter(|f| parent(f) == folder) {
                    list.append(&sub[sub.rfind(consts::PATH_SEPARATOR).map_or(0, |i| i + 1)..], None);
                }
                for name in state.raw_entries.get(&folder).into_iter().flatten() {
                    list.append(name.as_str(), None);
                }
            }
            _ => {
                for (name, _) in state.stored.get(&folder).into_iter().flatten() {
                    list.append(name.as_str(), None);
                }
            }
        }

        Ok(())
    }
}

impl Driver for MockDriver {
    fn camera_new(&self) -> NativeResult<CameraHandle> {
        let mut state = self.state.lock();
        state.check(MockOp::CameraNew)?;

        let id = state.mint();
        state.cameras.insert(id, false);

        Ok(CameraHandle(id))
    }

    fn camera_init(&self, camera: CameraHandle, _ctx: &Context) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.check(MockOp::Init)?;

        let initialized = state.cameras.get_mut(&camera.0).ok_or(ResultCode::BAD_PARAMETERS)?;
        *initialized = true;

        Ok(())
    }

    fn camera_exit(&self, camera: CameraHandle, _ctx: &Context) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.check(MockOp::Exit)?;

        let initialized = state.cameras.get_mut(&camera.0).ok_or(ResultCode::BAD_PARAMETERS)?;
        *initialized = false;

        Ok(())
    }

    fn camera_free(&self, camera: CameraHandle) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.cameras.remove(&camera.0).ok_or(ResultCode::BAD_PARAMETERS)?;
        state.stats.camera_frees += 1;
        Ok(())
    }

    fn camera_abilities(&self, camera: CameraHandle) -> NativeResult<Abilities> {
        let state = self.state.lock();
        state.check(MockOp::Abilities)?;
        state.check_camera(camera)?;
        Ok(state.abilities.clone())
    }

    fn camera_trigger_capture(&self, camera: CameraHandle, _ctx: &Context) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.check(MockOp::TriggerCapture)?;
        state.check_camera(camera)?;

        let (folder, name) = state.next_capture();
        state.events.push_back(RawEvent {
            tag: event_tag::FILE_ADDED,
            payload: Some(NativeFilePath::new(&folder, &name).to_bytes().into_boxed_slice()),
        });

        Ok(())
    }

    fn camera_capture(
        &self,
        camera: CameraHandle,
        kind: CaptureKind,
        _ctx: &Context,
    ) -> NativeResult<NativeFilePath> {
        let mut state = self.state.lock();
        state.check(MockOp::Capture)?;
        state.check_camera(camera)?;

        let supported = match kind {
            CaptureKind::Image => state.abilities.capture_image,
            CaptureKind::Movie => state.abilities.capture_video,
            CaptureKind::Sound => state.abilities.capture_audio,
        };
        if !supported {
            return Err(ResultCode::NOT_SUPPORTED);
        }

        let (folder, name) = state.next_capture();

        Ok(NativeFilePath::new(&folder, &name))
    }

    fn camera_capture_preview(
        &self,
        camera: CameraHandle,
        file: FileHandle,
        _ctx: &Context,
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.check(MockOp::CapturePreview)?;
        state.check_camera(camera)?;

        let preview = state.preview.clone();
        let slot = state.files.get_mut(&file.0).ok_or(ResultCode::BAD_PARAMETERS)?;
        *slot = preview;

        Ok(())
    }

    fn camera_wait_for_event(
        &self,
        camera: CameraHandle,
        timeout_ms: i32,
        ctx: &Context,
    ) -> NativeResult<RawEvent> {
        {
            let mut state = self.state.lock();
            state.check(MockOp::WaitForEvent)?;
            state.check_camera(camera)?;
            state.stats.event_waits += 1;
        }

        let timeout = std::time::Duration::from_millis(timeout_ms.max(0) as u64);
        let deadline = Instant::now() + timeout;

        loop {
            if ctx.take_cancel() {
                return Err(ResultCode::CANCEL);
            }

            if let Some(event) = self.state.lock().events.pop_front() {
                return Ok(event);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(RawEvent {
                    tag: event_tag::TIMEOUT,
                    payload: None,
                });
            }

            std::thread::sleep(consts::CANCEL_POLL_INTERVAL.min(deadline - now));
        }
    }

    fn camera_folder_list_folders(
        &self,
        camera: CameraHandle,
        folder: &str,
        list: &mut NativeList,
        _ctx: &Context,
    ) -> NativeResult<()> {
        self.list(camera, folder, MockOp::ListFolders, list)
    }

    fn camera_folder_list_files(
        &self,
        camera: CameraHandle,
        folder: &str,
        list: &mut NativeList,
        _ctx: &Context,
    ) -> NativeResult<()> {
        self.list(camera, folder, MockOp::ListFiles, list)
    }

    fn camera_file_get(
        &self,
        camera: CameraHandle,
        folder: &str,
        name: &str,
        kind: FileKind,
        file: FileHandle,
        _ctx: &Context,
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.check(MockOp::FileGet)?;
        state.check_camera(camera)?;

        let data = match kind {
            FileKind::Normal | FileKind::Raw => state
                .stored
                .get(&normalize(folder))
                .and_then(|files| files.iter().find(|(n, _)| n == name))
                .map(|(_, data)| data.clone())
                .ok_or(ResultCode::FILE_NOT_FOUND)?,
            FileKind::Preview => state.preview.clone(),
            FileKind::Audio | FileKind::Exif | FileKind::Metadata => {
                return Err(ResultCode::NOT_SUPPORTED);
            }
        };

        let slot = state.files.get_mut(&file.0).ok_or(ResultCode::BAD_PARAMETERS)?;
        *slot = data;

        Ok(())
    }

    fn camera_file_delete(
        &self,
        camera: CameraHandle,
        folder: &str,
        name: &str,
        _ctx: &Context,
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.check(MockOp::FileDelete)?;
        state.check_camera(camera)?;

        let files = state
            .stored
            .get_mut(&normalize(folder))
            .ok_or(ResultCode::DIRECTORY_NOT_FOUND)?;
        let index = files
            .iter()
            .position(|(n, _)| n == name)
            .ok_or(ResultCode::FILE_NOT_FOUND)?;
        files.remove(index);

        Ok(())
    }

    fn camera_get_config(
        &self,
        camera: CameraHandle,
        root: WidgetHandle,
        _ctx: &Context,
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.check(MockOp::GetConfig)?;
        state.check_camera(camera)?;

        if !state.widgets.contains_key(&root.0) {
            return Err(ResultCode::BAD_PARAMETERS);
        }

        let template = state.config.clone();
        let children: Vec<u64> = template
            .children
            .iter()
            .map(|child| state.instantiate(child))
            .collect();

        let node = state.widgets.get_mut(&root.0).ok_or(ResultCode::BAD_PARAMETERS)?;
        node.info = WidgetInfo {
            name: template.name,
            label: template.label,
            kind: template.kind,
        };
        node.children = children;

        Ok(())
    }

    fn camera_set_config(
        &self,
        camera: CameraHandle,
        widget: WidgetHandle,
        _ctx: &Context,
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.check(MockOp::SetConfig)?;
        state.check_camera(camera)?;
        state.widget(widget)?;

        let mut values = Vec::new();
        state.collect_values(widget.0, &mut values);

        // Validate everything before touching the device.
        for (name, value) in &values {
            let target = state.config.find(name).ok_or(ResultCode::BAD_PARAMETERS)?;
            if let NativeValue::Text(text) = value {
                if !target.choices.is_empty() && !target.choices.contains(text) {
                    return Err(ResultCode::BAD_PARAMETERS);
                }
            }
        }

        for (name, value) in values {
            if let Some(target) = state.config.find_mut(&name) {
                target.value = Some(value);
            }
        }
        state.stats.set_config_calls += 1;

        Ok(())
    }

    fn file_new(&self) -> NativeResult<FileHandle> {
        let mut state = self.state.lock();
        let id = state.mint();
        state.files.insert(id, Bytes::new());
        Ok(FileHandle(id))
    }

    fn file_data_and_size(&self, file: FileHandle) -> NativeResult<Bytes> {
        self.state
            .lock()
            .files
            .get(&file.0)
            .cloned()
            .ok_or(ResultCode::BAD_PARAMETERS)
    }

    fn file_free(&self, file: FileHandle) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.files.remove(&file.0).ok_or(ResultCode::BAD_PARAMETERS)?;
        state.stats.file_frees += 1;
        Ok(())
    }

    fn widget_new(&self, kind: WidgetKind, label: &str) -> NativeResult<WidgetHandle> {
        let mut state = self.state.lock();
        state.check(MockOp::WidgetNew)?;

        let id = state.mint();
        state.widgets.insert(
            id,
            WidgetNode {
                info: WidgetInfo {
                    name: String::new(),
                    label: label.to_owned(),
                    kind,
                },
                value: None,
                choices: Vec::new(),
                range: (0.0, 0.0, 0.0),
                children: Vec::new(),
            },
        );

        Ok(WidgetHandle(id))
    }

    fn widget_free(&self, widget: WidgetHandle) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.widget(widget)?;
        state.remove_subtree(widget.0);
        state.stats.widget_frees += 1;
        Ok(())
    }

    fn widget_info(&self, widget: WidgetHandle) -> NativeResult<WidgetInfo> {
        Ok(self.state.lock().widget(widget)?.info.clone())
    }

    fn widget_child_by_name(&self, widget: WidgetHandle, name: &str) -> NativeResult<WidgetHandle> {
        let state = self.state.lock();
        state.widget(widget)?;
        state
            .find_descendant(widget.0, name)
            .map(WidgetHandle)
            .ok_or(ResultCode::BAD_PARAMETERS)
    }

    fn widget_count_children(&self, widget: WidgetHandle) -> NativeResult<usize> {
        Ok(self.state.lock().widget(widget)?.children.len())
    }

    fn widget_child(&self, widget: WidgetHandle, index: usize) -> NativeResult<WidgetHandle> {
        self.state
            .lock()
            .widget(widget)?
            .children
            .get(index)
            .copied()
            .map(WidgetHandle)
            .ok_or(ResultCode::BAD_PARAMETERS)
    }

    fn widget_value(&self, widget: WidgetHandle) -> NativeResult<Option<NativeValue>> {
        Ok(self.state.lock().widget(widget)?.value.clone())
    }

    fn widget_set_value(&self, widget: WidgetHandle, value: &NativeValue) -> NativeResult<()> {
        let mut state = self.state.lock();
        let node = state.widgets.get_mut(&widget.0).ok_or(ResultCode::BAD_PARAMETERS)?;

        let fits = matches!(
            (node.info.kind, value),
            (WidgetKind::Text | WidgetKind::Radio | WidgetKind::Menu, NativeValue::Text(_))
                | (WidgetKind::Range, NativeValue::Float(_))
                | (WidgetKind::Toggle | WidgetKind::Date, NativeValue::Int(_))
        );
        if !fits {
            return Err(ResultCode::BAD_PARAMETERS);
        }

        node.value = Some(value.clone());

        Ok(())
    }

    fn widget_choices(&self, widget: WidgetHandle) -> NativeResult<Vec<String>> {
        let state = self.state.lock();
        let node = state.widget(widget)?;

        match node.info.kind {
            WidgetKind::Radio | WidgetKind::Menu => Ok(node.choices.clone()),
            _ => Err(ResultCode::BAD_PARAMETERS),
        }
    }

    fn widget_range(&self, widget: WidgetHandle) -> NativeResult<(f32, f32, f32)> {
        let state = self.state.lock();
        let node = state.widget(widget)?;

        match node.info.kind {
            WidgetKind::Range => Ok(node.range),
            _ => Err(ResultCode::BAD_PARAMETERS),
        }
    }

    fn result_as_string(&self, code: ResultCode) -> &'static str {
        self.state
            .lock()
            .messages
            .get(&code)
            .copied()
            .unwrap_or_else(|| code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized() -> (MockDriver, CameraHandle, Context) {
        let driver = MockDriver::new()
            .with_folder("/a/b")
            .with_file("/a", "one.jpg", vec![1u8, 2, 3]);
        let ctx = Context::new();
        let camera = driver.camera_new().unwrap();
        driver.camera_init(camera, &ctx).unwrap();
        (driver, camera, ctx)
    }

    #[test]
    fn folders_are_listed_by_direct_parent() {
        let (driver, camera, ctx) = initialized();

        let mut root = NativeList::new();
        driver.camera_folder_list_folders(camera, "/", &mut root, &ctx).unwrap();
        assert_eq!(root.name(0), Ok("a"));
        assert_eq!(root.count(), 1);

        let mut files = NativeList::new();
        driver.camera_folder_list_files(camera, "/a/", &mut files, &ctx).unwrap();
        assert_eq!(files.name(0), Ok("one.jpg"));

        let mut missing = NativeList::new();
        assert_eq!(
            driver.camera_folder_list_folders(camera, "/nope", &mut missing, &ctx),
            Err(ResultCode::DIRECTORY_NOT_FOUND)
        );
    }

    #[test]
    fn double_free_is_reported() {
        let driver = MockDriver::new();
        let file = driver.file_new().unwrap();

        assert_eq!(driver.file_free(file), Ok(()));
        assert_eq!(driver.file_free(file), Err(ResultCode::BAD_PARAMETERS));
        assert_eq!(driver.stats().file_frees, 1);
    }

    #[test]
    fn widget_free_releases_subtree() {
        let (driver, camera, ctx) = initialized();
        let root = driver.widget_new(WidgetKind::Window, "").unwrap();

        driver.camera_get_config(camera, root, &ctx).unwrap();
        assert!(driver.live_widgets() > 1);

        driver.widget_free(root).unwrap();
        assert_eq!(driver.live_widgets(), 0);
    }

    #[test]
    fn wait_times_out_without_events() {
        let (driver, camera, ctx) = initialized();

        let event = driver.camera_wait_for_event(camera, 20, &ctx).unwrap();
        assert_eq!(event.tag, event_tag::TIMEOUT);
    }

    #[test]
    fn injected_failures_persist_until_cleared() {
        let (driver, camera, _ctx) = initialized();

        driver.fail(MockOp::Abilities, ResultCode::IO);
        assert_eq!(driver.camera_abilities(camera), Err(ResultCode::IO));
        assert_eq!(driver.camera_abilities(camera), Err(ResultCode::IO));

        driver.clear_failure(MockOp::Abilities);
        assert_eq!(driver.camera_abilities(camera).unwrap().model, MOCK_MODEL);
    }
}
