use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context as TaskContext, Poll},
};

use log::*;
use tokio::sync::oneshot;

use crate::{
    CamError, CamResult, consts,
    driver::{CameraHandle, Context, Driver, RawEvent, c_str_lossy, event_tag},
    result::Translate,
};

#[repr(i32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, int_enum::IntEnum)]
/// Kind of a camera event.
pub enum CameraEventType {
    #[default]
    Unknown = 0,
    /// The native wait elapsed without anything happening.
    Timeout = 1,
    /// A new file appeared on the camera storage.
    FileAdded = 2,
}

/// Event reported by the camera. `folder` and `file` are only set for
/// [`CameraEventType::FileAdded`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraEvent {
    pub kind: CameraEventType,
    pub folder: String,
    pub file: String,
}

impl CameraEvent {
    /// Decodes a native event. The payload is consumed and released here.
    pub fn decode(raw: RawEvent) -> Self {
        let kind = match raw.tag {
            event_tag::TIMEOUT => CameraEventType::Timeout,
            event_tag::FILE_ADDED => CameraEventType::FileAdded,
            event_tag::UNKNOWN => CameraEventType::Unknown,
            other => {
                debug!("Treating event tag {other} as unknown");
                CameraEventType::Unknown
            }
        };

        if kind != CameraEventType::FileAdded {
            return Self {
                kind,
                ..Default::default()
            };
        }

        let Some(payload) = raw.payload else {
            warn!("File added event without a file path payload");
            return Self {
                kind,
                ..Default::default()
            };
        };

        let name_end = payload.len().min(consts::FILE_PATH_NAME_LEN);
        let file = c_str_lossy(&payload[..name_end]);
        let folder = payload
            .get(consts::FILE_PATH_NAME_LEN..)
            .map(|field| c_str_lossy(&field[..field.len().min(consts::FILE_PATH_FOLDER_LEN)]))
            .unwrap_or_default();

        Self { kind, folder, file }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == CameraEventType::Timeout
    }
}

/// Pending result of [`Camera::async_wait_for_event`](crate::cam::Camera::async_wait_for_event).
///
/// Resolves exactly once. Dropping it abandons the result; the background
/// wait still runs to completion and its event is discarded.
#[must_use = "dropping the wait discards the event"]
#[derive(Debug)]
pub struct EventWait {
    rx: oneshot::Receiver<CamResult<CameraEvent>>,
}

impl EventWait {
    /// Blocks the current thread until the event arrives.
    /// Must not be called from within an async context.
    pub fn blocking_wait(self) -> CamResult<CameraEvent> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(CamError::EventWaitAborted))
    }
}

impl Future for EventWait {
    type Output = CamResult<CameraEvent>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        match futures::ready!(Pin::new(&mut self.rx).poll(cx)) {
            Ok(res) => Poll::Ready(res),
            Err(_) => Poll::Ready(Err(CamError::EventWaitAborted)),
        }
    }
}

/// Runs one native event wait on a blocking thread and hands back its result.
pub(crate) fn spawn_wait(
    driver: Arc<dyn Driver>,
    camera: CameraHandle,
    timeout_ms: i32,
    ctx: Context,
) -> EventWait {
    let (tx, rx) = oneshot::channel();

    let job = move || {
        let res = driver
            .camera_wait_for_event(camera, timeout_ms, &ctx)
            .map(CameraEvent::decode)
            .translate(&*driver);

        if tx.send(res).is_err() {
            debug!("Event receiver was dropped, discarding the event");
        }
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(job);
        }
        Err(_) => {
            // Outside of a runtime. A failed spawn drops the sender, which the
            // receiver reports as an aborted wait.
            if let Err(e) = std::thread::Builder::new()
                .name(consts::EVENT_THREAD_NAME.to_owned())
                .spawn(job)
            {
                error!("Unable to spawn the event wait thread ({e})");
            }
        }
    }

    EventWait { rx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::NativeFilePath;

    #[test]
    fn decodes_file_added() {
        let path = NativeFilePath::new("/DCIM/100CANON", "IMG_0001.JPG");
        let raw = RawEvent {
            tag: event_tag::FILE_ADDED,
            payload: Some(path.to_bytes().into_boxed_slice()),
        };

        let event = CameraEvent::decode(raw);

        assert_eq!(event.kind, CameraEventType::FileAdded);
        assert_eq!(event.folder, "/DCIM/100CANON");
        assert_eq!(event.file, "IMG_0001.JPG");
    }

    #[test]
    fn other_kinds_carry_no_path() {
        let path = NativeFilePath::new("/DCIM", "ignored.jpg");

        for tag in [event_tag::TIMEOUT, event_tag::UNKNOWN, event_tag::CAPTURE_COMPLETE, 42] {
            let event = CameraEvent::decode(RawEvent {
                tag,
                payload: Some(path.to_bytes().into_boxed_slice()),
            });

            assert!(event.folder.is_empty());
            assert!(event.file.is_empty());
        }

        let timeout = CameraEvent::decode(RawEvent {
            tag: event_tag::TIMEOUT,
            payload: None,
        });
        assert!(timeout.is_timeout());

        let folder_added = CameraEvent::decode(RawEvent {
            tag: event_tag::FOLDER_ADDED,
            payload: None,
        });
        assert_eq!(folder_added.kind, CameraEventType::Unknown);
    }

    #[test]
    fn short_payload_decodes_what_is_there() {
        let event = CameraEvent::decode(RawEvent {
            tag: event_tag::FILE_ADDED,
            payload: Some(b"a.jpg\0".to_vec().into_boxed_slice()),
        });

        assert_eq!(event.file, "a.jpg");
        assert_eq!(event.folder, "");
    }

    #[tokio::test]
    async fn dropped_sender_reports_abort() {
        let (tx, rx) = oneshot::channel();
        drop(tx);

        let wait = EventWait { rx };

        assert!(matches!(wait.await, Err(CamError::EventWaitAborted)));
    }
}
