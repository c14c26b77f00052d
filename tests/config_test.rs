//! Configuration tree navigation, value assignment and ownership.

use std::sync::Arc;

use chrono::DateTime;
use tether_cam::{
    CamError,
    cam::Camera,
    driver::NativeValue,
    mock::{MockDriver, MockOp, MockWidget},
    result::ResultCode,
    util::CamUtil,
    widget::{WidgetKind, WidgetValue},
};

fn live_camera(driver: MockDriver) -> (Arc<MockDriver>, Camera) {
    let driver = Arc::new(driver);
    let mut cam = Camera::new(driver.clone());
    cam.init().unwrap();
    (driver, cam)
}

#[test]
fn set_iso_and_push() {
    let (driver, cam) = live_camera(MockDriver::new());

    let mut root = cam.get_config().unwrap();
    assert!(root.is_root());
    assert_eq!(root.kind().unwrap(), WidgetKind::Window);
    assert_eq!(root.name().unwrap(), "main");

    let iso = root.child_by_name("iso").unwrap();
    assert!(!iso.is_root());
    assert_eq!(iso.kind().unwrap(), WidgetKind::Radio);
    assert_eq!(iso.label().unwrap(), "ISO Speed");

    iso.set_value("400").unwrap();
    assert_eq!(iso.value().unwrap(), Some(WidgetValue::Text("400".into())));

    cam.set_config(&root).unwrap();
    assert_eq!(driver.device_value("iso"), Some(NativeValue::Text("400".into())));
    assert_eq!(driver.stats().set_config_calls, 1);

    root.free().unwrap();
    assert_eq!(driver.live_widgets(), 0);
}

#[test]
fn unknown_child_is_not_found() {
    let (_driver, cam) = live_camera(MockDriver::new());
    let root = cam.get_config().unwrap();

    match root.child_by_name("nosuchwidget").unwrap_err() {
        CamError::WidgetNotFound { name, code, message } => {
            assert_eq!(name, "nosuchwidget");
            assert_eq!(code, ResultCode::BAD_PARAMETERS.0);
            assert_eq!(message, "Bad parameters");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn child_views_cannot_be_freed() {
    let (driver, cam) = live_camera(MockDriver::new());
    let root = cam.get_config().unwrap();

    let mut section = root.child_by_name("imgsettings").unwrap();
    assert!(matches!(section.free(), Err(CamError::NotRoot)));

    drop(section);
    assert_eq!(driver.stats().widget_frees, 0);

    drop(root);
    assert_eq!(driver.stats().widget_frees, 1);
    assert_eq!(driver.live_widgets(), 0);
}

#[test]
fn views_stop_working_after_the_root_is_freed() {
    let (driver, cam) = live_camera(MockDriver::new());
    let mut root = cam.get_config().unwrap();
    let iso = root.child_by_name("iso").unwrap();

    root.free().unwrap();
    root.free().unwrap();

    assert_eq!(driver.stats().widget_frees, 1);
    assert!(matches!(iso.set_value("200"), Err(CamError::WidgetFreed)));
    assert!(matches!(cam.set_config(&iso), Err(CamError::WidgetFreed)));
    assert!(matches!(root.children(), Err(CamError::WidgetFreed)));
}

#[test]
fn failed_config_read_frees_the_root() {
    let (driver, cam) = live_camera(MockDriver::new());
    driver.fail(MockOp::GetConfig, ResultCode::CAMERA_ERROR);

    let err = cam.get_config().unwrap_err();

    assert_eq!(err.code(), Some(-113));
    assert_eq!(driver.stats().widget_frees, 1);
    assert_eq!(driver.live_widgets(), 0);
}

#[test]
fn typed_values() {
    let (driver, cam) = live_camera(MockDriver::new());
    let root = cam.get_config().unwrap();

    let viewfinder = root.child_by_name("viewfinder").unwrap();
    viewfinder.set_value(true).unwrap();
    assert_eq!(viewfinder.value().unwrap(), Some(WidgetValue::Toggle(true)));

    let ev = root.child_by_name("exposurecompensation").unwrap();
    let range = ev.range().unwrap();
    assert_eq!((range.min, range.max), (-3.0, 3.0));
    ev.set_value(1.0f32).unwrap();

    let date = DateTime::from_timestamp(1_234_567_890, 0).unwrap();
    let datetime = root.child_by_name("datetime").unwrap();
    datetime.set_value(date).unwrap();
    assert_eq!(datetime.value().unwrap(), Some(WidgetValue::Date(date)));

    let artist = root.child_by_name("artist").unwrap();
    artist.set_value(WidgetValue::Bytes(b"Jane Doe".to_vec())).unwrap();

    cam.set_config(&root).unwrap();
    assert_eq!(driver.device_value("viewfinder"), Some(NativeValue::Int(1)));
    assert_eq!(driver.device_value("exposurecompensation"), Some(NativeValue::Float(1.0)));
    assert_eq!(driver.device_value("datetime"), Some(NativeValue::Int(1_234_567_890)));
    assert_eq!(driver.device_value("artist"), Some(NativeValue::Text("Jane Doe".into())));
}

#[test]
fn mismatched_values_are_rejected_before_the_driver() {
    let (driver, cam) = live_camera(MockDriver::new());
    let root = cam.get_config().unwrap();

    let viewfinder = root.child_by_name("viewfinder").unwrap();
    assert!(matches!(
        viewfinder.set_value("on"),
        Err(CamError::ValueMismatch { kind: WidgetKind::Toggle, .. })
    ));

    let button = root.child_by_name("autofocusdrive").unwrap();
    assert!(matches!(button.set_value(1), Err(CamError::ValueMismatch { .. })));
    assert_eq!(button.value().unwrap(), None);

    assert!(matches!(root.set_value("x"), Err(CamError::ValueMismatch { .. })));
    assert_eq!(driver.device_value("viewfinder"), Some(NativeValue::Int(0)));
}

#[test]
fn invalid_choice_fails_on_push() {
    let (driver, cam) = live_camera(MockDriver::new());
    let root = cam.get_config().unwrap();

    root.child_by_name("iso").unwrap().set_value("12345").unwrap();

    assert_eq!(cam.set_config(&root).unwrap_err().code(), Some(-2));
    assert_eq!(driver.device_value("iso"), Some(NativeValue::Text("100".into())));
}

#[test]
fn single_widget_push() {
    let (driver, cam) = live_camera(MockDriver::new());
    let root = cam.get_config().unwrap();

    let wb = root.child_by_name("whitebalance").unwrap();
    assert!(wb.choices().unwrap().contains(&"Daylight".to_owned()));
    wb.set_value("Daylight").unwrap();

    cam.set_config(&wb).unwrap();

    assert_eq!(driver.device_value("whitebalance"), Some(NativeValue::Text("Daylight".into())));
}

#[test]
fn walking_the_tree() {
    let config = MockWidget::window("main", "Config")
        .child(MockWidget::section("a", "A").child(MockWidget::text("a1", "A1", "x")))
        .child(MockWidget::section("b", "B"));
    let (_driver, cam) = live_camera(MockDriver::new().with_config(config));

    let root = cam.get_config().unwrap();
    let children = root.children().unwrap();

    let names: Vec<String> = children.iter().map(|c| c.name().unwrap()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(children[0].child_count().unwrap(), 1);
    assert_eq!(children[1].child_count().unwrap(), 0);

    let nested = children[0].child_by_name("a1").unwrap();
    assert_eq!(nested.value().unwrap(), Some(WidgetValue::Text("x".into())));
}

#[test]
fn config_helpers() {
    let (driver, cam) = live_camera(MockDriver::new());

    assert_eq!(
        cam.config_value("aperture").unwrap(),
        Some(WidgetValue::Text("5.6".into()))
    );

    cam.set_config_value("aperture", "8").unwrap();

    assert_eq!(driver.device_value("aperture"), Some(NativeValue::Text("8".into())));
    assert_eq!(driver.live_widgets(), 0);
}
