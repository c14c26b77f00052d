use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    CamError, CamResult,
    driver::{Driver, NativeValue, WidgetHandle, WidgetInfo},
    result::Translate,
};

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, int_enum::IntEnum)]
/// Type of a configuration widget node.
pub enum WidgetKind {
    /// Root of a configuration tree.
    Window = 0,
    /// Group of widgets.
    Section = 1,
    Text = 2,
    /// Float with minimum, maximum and step.
    Range = 3,
    /// On/off (or tri-state) integer.
    Toggle = 4,
    /// One text choice out of a list.
    Radio = 5,
    /// One text choice out of a list, shown as a drop-down.
    Menu = 6,
    /// Action without a value.
    Button = 7,
    /// Unix timestamp in seconds.
    Date = 8,
}

impl WidgetKind {
    /// Whether the kind holds a value at all.
    pub fn has_value(self) -> bool {
        !matches!(self, Self::Window | Self::Section | Self::Button)
    }
}

/// Value assigned to or read from a widget.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetValue {
    Text(String),
    Integer(i32),
    Float(f32),
    Toggle(bool),
    Date(DateTime<Utc>),
    /// Raw native representation. Four bytes (native endian) for numeric
    /// kinds, UTF-8 for textual ones.
    Bytes(Vec<u8>),
}

impl WidgetValue {
    fn shape(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Toggle(_) => "toggle",
            Self::Date(_) => "date",
            Self::Bytes(_) => "raw bytes",
        }
    }

    /// Maps the value onto the representation stored by a widget of `kind`.
    pub fn to_native(&self, kind: WidgetKind) -> CamResult<NativeValue> {
        let mismatch = || CamError::ValueMismatch {
            kind,
            shape: self.shape(),
        };

        match kind {
            WidgetKind::Text | WidgetKind::Radio | WidgetKind::Menu => match self {
                Self::Text(text) => Ok(NativeValue::Text(checked_text(text)?)),
                Self::Bytes(raw) => {
                    let text = std::str::from_utf8(raw).map_err(|_| mismatch())?;
                    Ok(NativeValue::Text(checked_text(text)?))
                }
                _ => Err(mismatch()),
            },
            WidgetKind::Range => match self {
                Self::Float(value) => Ok(NativeValue::Float(*value)),
                Self::Integer(value) => {
                    // Beyond 2^24 not every integer has an exact f32.
                    let float = *value as f32;
                    if float as i64 == i64::from(*value) {
                        Ok(NativeValue::Float(float))
                    } else {
                        Err(mismatch())
                    }
                }
                Self::Bytes(raw) => Ok(NativeValue::Float(f32::from_ne_bytes(
                    four_bytes(raw).ok_or_else(mismatch)?,
                ))),
                _ => Err(mismatch()),
            },
            WidgetKind::Toggle => match self {
                Self::Toggle(on) => Ok(NativeValue::Int(i32::from(*on))),
                Self::Integer(value) => Ok(NativeValue::Int(*value)),
                Self::Bytes(raw) => Ok(NativeValue::Int(i32::from_ne_bytes(
                    four_bytes(raw).ok_or_else(mismatch)?,
                ))),
                _ => Err(mismatch()),
            },
            WidgetKind::Date => match self {
                Self::Date(date) => i32::try_from(date.timestamp())
                    .map(NativeValue::Int)
                    .map_err(|_| mismatch()),
                Self::Integer(value) => Ok(NativeValue::Int(*value)),
                Self::Bytes(raw) => Ok(NativeValue::Int(i32::from_ne_bytes(
                    four_bytes(raw).ok_or_else(mismatch)?,
                ))),
                _ => Err(mismatch()),
            },
            WidgetKind::Window | WidgetKind::Section | WidgetKind::Button => Err(mismatch()),
        }
    }

    /// Interprets a stored native value according to the widget kind.
    pub fn from_native(kind: WidgetKind, value: NativeValue) -> Self {
        match (kind, value) {
            (WidgetKind::Toggle, NativeValue::Int(v)) => Self::Toggle(v != 0),
            (WidgetKind::Date, NativeValue::Int(v)) => DateTime::from_timestamp(i64::from(v), 0)
                .map(Self::Date)
                .unwrap_or(Self::Integer(v)),
            (_, NativeValue::Int(v)) => Self::Integer(v),
            (_, NativeValue::Float(v)) => Self::Float(v),
            (_, NativeValue::Text(v)) => Self::Text(v),
        }
    }
}

fn checked_text(text: &str) -> CamResult<String> {
    if text.contains('\0') {
        return Err(CamError::InteriorNul);
    }
    Ok(text.to_owned())
}

fn four_bytes(raw: &[u8]) -> Option<[u8; 4]> {
    raw.try_into().ok()
}

impl From<&str> for WidgetValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for WidgetValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i32> for WidgetValue {
    fn from(value: i32) -> Self {
        Self::Integer(value)
    }
}

impl From<f32> for WidgetValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for WidgetValue {
    fn from(value: bool) -> Self {
        Self::Toggle(value)
    }
}

impl From<DateTime<Utc>> for WidgetValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Vec<u8>> for WidgetValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Bounds of a range widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidgetRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

/// Node of the device configuration tree.
///
/// The widget returned by [`Camera::get_config`](crate::cam::Camera::get_config)
/// is the root and owns the whole tree. Widgets returned by lookups are views
/// into that tree: they cannot be freed on their own and stop working once
/// the root is freed.
pub struct ConfigWidget {
    driver: Arc<dyn Driver>,
    handle: WidgetHandle,
    is_root: bool,
    /// Shared by the root and all of its views.
    alive: Arc<AtomicBool>,
}

impl ConfigWidget {
    pub(crate) fn new_root(driver: Arc<dyn Driver>, handle: WidgetHandle) -> Self {
        Self {
            driver,
            handle,
            is_root: true,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    fn view(&self, handle: WidgetHandle) -> Self {
        Self {
            driver: self.driver.clone(),
            handle,
            is_root: false,
            alive: self.alive.clone(),
        }
    }

    /// Handle of a node whose tree has not been freed yet.
    pub(crate) fn live_handle(&self) -> CamResult<WidgetHandle> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(self.handle)
        } else {
            Err(CamError::WidgetFreed)
        }
    }

    fn info(&self) -> CamResult<WidgetInfo> {
        self.driver
            .widget_info(self.live_handle()?)
            .translate(&*self.driver)
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn name(&self) -> CamResult<String> {
        Ok(self.info()?.name)
    }

    pub fn label(&self) -> CamResult<String> {
        Ok(self.info()?.label)
    }

    pub fn kind(&self) -> CamResult<WidgetKind> {
        Ok(self.info()?.kind)
    }

    /// Finds a descendant by name. The result is a view into this tree.
    pub fn child_by_name(&self, name: &str) -> CamResult<ConfigWidget> {
        let handle = self.live_handle()?;

        let child = self
            .driver
            .widget_child_by_name(handle, name)
            .map_err(|code| CamError::WidgetNotFound {
                name: name.to_owned(),
                code: code.0,
                message: self.driver.result_as_string(code).to_owned(),
            })?;

        Ok(self.view(child))
    }

    pub fn child_count(&self) -> CamResult<usize> {
        self.driver
            .widget_count_children(self.live_handle()?)
            .translate(&*self.driver)
    }

    /// Direct children, in device order.
    pub fn children(&self) -> CamResult<Vec<ConfigWidget>> {
        let handle = self.live_handle()?;
        let count = self.driver.widget_count_children(handle).translate(&*self.driver)?;

        (0..count)
            .map(|index| {
                self.driver
                    .widget_child(handle, index)
                    .translate(&*self.driver)
                    .map(|child| self.view(child))
            })
            .collect()
    }

    /// Current value, `None` for kinds without one.
    pub fn value(&self) -> CamResult<Option<WidgetValue>> {
        let handle = self.live_handle()?;
        let kind = self.info()?.kind;

        Ok(self
            .driver
            .widget_value(handle)
            .translate(&*self.driver)?
            .map(|value| WidgetValue::from_native(kind, value)))
    }

    /// Assigns a value locally. Nothing reaches the camera until the tree is
    /// pushed with [`Camera::set_config`](crate::cam::Camera::set_config).
    pub fn set_value(&self, value: impl Into<WidgetValue>) -> CamResult<()> {
        let handle = self.live_handle()?;
        let kind = self.info()?.kind;
        let native = value.into().to_native(kind)?;

        self.driver
            .widget_set_value(handle, &native)
            .translate(&*self.driver)?;

        Ok(())
    }

    /// Choices of a radio or menu widget.
    pub fn choices(&self) -> CamResult<Vec<String>> {
        self.driver
            .widget_choices(self.live_handle()?)
            .translate(&*self.driver)
    }

    pub fn range(&self) -> CamResult<WidgetRange> {
        let (min, max, step) = self
            .driver
            .widget_range(self.live_handle()?)
            .translate(&*self.driver)?;
        Ok(WidgetRange { min, max, step })
    }

    /// Frees the whole tree. Only valid on the root; freeing twice is a no-op.
    pub fn free(&mut self) -> CamResult<()> {
        if !self.is_root {
            return Err(CamError::NotRoot);
        }

        if !self.alive.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        self.driver.widget_free(self.handle).translate(&*self.driver)?;

        Ok(())
    }
}

impl Drop for ConfigWidget {
    fn drop(&mut self) {
        if self.is_root {
            if let Err(e) = self.free() {
                warn!("Error while freeing configuration tree on drop ({e})");
            }
        }
    }
}

impl std::fmt::Debug for ConfigWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWidget")
            .field("handle", &self.handle)
            .field("is_root", &self.is_root)
            .field("alive", &self.alive.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_kinds_take_text() {
        for kind in [WidgetKind::Text, WidgetKind::Radio, WidgetKind::Menu] {
            assert_eq!(
                WidgetValue::from("400").to_native(kind).unwrap(),
                NativeValue::Text("400".into())
            );
        }

        assert_eq!(
            WidgetValue::Bytes(b"Manual".to_vec()).to_native(WidgetKind::Radio).unwrap(),
            NativeValue::Text("Manual".into())
        );
    }

    #[test]
    fn text_with_nul_is_rejected() {
        assert!(matches!(
            WidgetValue::from("a\0b").to_native(WidgetKind::Text),
            Err(CamError::InteriorNul)
        ));
    }

    #[test]
    fn numeric_kinds() {
        assert_eq!(
            WidgetValue::from(true).to_native(WidgetKind::Toggle).unwrap(),
            NativeValue::Int(1)
        );
        assert_eq!(
            WidgetValue::from(2).to_native(WidgetKind::Range).unwrap(),
            NativeValue::Float(2.0)
        );
        assert_eq!(
            WidgetValue::Bytes(1.5f32.to_ne_bytes().to_vec())
                .to_native(WidgetKind::Range)
                .unwrap(),
            NativeValue::Float(1.5)
        );

        let date = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(
            WidgetValue::from(date).to_native(WidgetKind::Date).unwrap(),
            NativeValue::Int(1_700_000_000)
        );
    }

    #[test]
    fn range_integers_must_be_exact() {
        assert_eq!(
            WidgetValue::from(16_777_216).to_native(WidgetKind::Range).unwrap(),
            NativeValue::Float(16_777_216.0)
        );
        assert_eq!(
            WidgetValue::from(-40).to_native(WidgetKind::Range).unwrap(),
            NativeValue::Float(-40.0)
        );

        for value in [16_777_217, -16_777_217, i32::MAX] {
            assert!(matches!(
                WidgetValue::from(value).to_native(WidgetKind::Range),
                Err(CamError::ValueMismatch { kind: WidgetKind::Range, .. })
            ));
        }
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let cases = [
            (WidgetValue::from("on"), WidgetKind::Toggle),
            (WidgetValue::from(1.0f32), WidgetKind::Text),
            (WidgetValue::Bytes(vec![1, 2, 3]), WidgetKind::Range),
            (WidgetValue::from(1), WidgetKind::Window),
            (WidgetValue::from(true), WidgetKind::Button),
        ];

        for (value, kind) in cases {
            assert!(
                matches!(value.to_native(kind), Err(CamError::ValueMismatch { .. })),
                "{value:?} accepted by {kind:?}"
            );
        }
    }

    #[test]
    fn reading_back() {
        assert_eq!(
            WidgetValue::from_native(WidgetKind::Toggle, NativeValue::Int(0)),
            WidgetValue::Toggle(false)
        );
        assert_eq!(
            WidgetValue::from_native(WidgetKind::Date, NativeValue::Int(60)),
            WidgetValue::Date(DateTime::from_timestamp(60, 0).unwrap())
        );
        assert_eq!(
            WidgetValue::from_native(WidgetKind::Menu, NativeValue::Text("RAW".into())),
            WidgetValue::Text("RAW".into())
        );
    }
}
