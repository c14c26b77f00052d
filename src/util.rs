use std::future::Future;

use log::*;

use crate::{
    CamResult,
    cam::{Camera, CapturedFilePath},
    event::CameraEventType,
    widget::WidgetValue,
};

/// This trait provides convenience functions for the `Camera` struct.
pub trait CamUtil {
    /// Reads a stored file completely, chunk by chunk.
    ///
    /// Returns the file contents.
    fn download_file(&self, folder: &str, name: &str) -> CamResult<Vec<u8>>;

    /// Convenience method for taking a picture and also transferring it.
    ///
    /// * `delete_after` - Removes the picture from the camera storage once it was read.
    ///
    /// Returns where the picture was stored and its contents.
    fn capture_and_download(&self, delete_after: bool) -> CamResult<(CapturedFilePath, Vec<u8>)>;

    /// Waits until the camera reports a new file, skipping unrelated events.
    ///
    /// * `max_events` - Number of events to look at before giving up.
    ///
    /// Returns `None` if the camera went quiet (a wait timed out) or `max_events` were used up.
    fn wait_for_file_added(
        &self,
        max_events: usize,
    ) -> impl Future<Output = CamResult<Option<CapturedFilePath>>> + Send;

    /// Reads the value of one configuration entry.
    fn config_value(&self, name: &str) -> CamResult<Option<WidgetValue>>;

    /// Changes one configuration entry and pushes it to the camera.
    fn set_config_value(&self, name: &str, value: impl Into<WidgetValue>) -> CamResult<()>;
}

impl CamUtil for Camera {
    fn download_file(&self, folder: &str, name: &str) -> CamResult<Vec<u8>> {
        let mut reader = self.file_reader(folder, name)?;

        let mut data = Vec::with_capacity(reader.full_size());
        let mut chunk = vec![0; self.settings().chunk_cap.min(reader.full_size()).max(1)];

        loop {
            let read = reader.read_chunk(&mut chunk)?;

            data.extend_from_slice(&chunk[..read.len]);

            if read.eof {
                break;
            }
        }

        reader.close()?;

        Ok(data)
    }

    fn capture_and_download(&self, delete_after: bool) -> CamResult<(CapturedFilePath, Vec<u8>)> {
        let path = self.trigger_capture_to_file()?;
        let data = self.download_file(&path.folder, &path.name)?;

        if delete_after {
            self.delete_file(&path.folder, &path.name)?;
        }

        Ok((path, data))
    }

    async fn wait_for_file_added(&self, max_events: usize) -> CamResult<Option<CapturedFilePath>> {
        let timeout = self.settings().event_timeout;

        for _ in 0..max_events {
            let event = self.async_wait_for_event(timeout)?.await?;

            match event.kind {
                CameraEventType::FileAdded => {
                    return Ok(Some(CapturedFilePath {
                        name: event.file,
                        folder: event.folder,
                    }));
                }
                CameraEventType::Timeout => return Ok(None),
                CameraEventType::Unknown => debug!("Skipping unknown camera event"),
            }
        }

        Ok(None)
    }

    fn config_value(&self, name: &str) -> CamResult<Option<WidgetValue>> {
        let root = self.get_config()?;
        root.child_by_name(name)?.value()
    }

    fn set_config_value(&self, name: &str, value: impl Into<WidgetValue>) -> CamResult<()> {
        let mut root = self.get_config()?;

        root.child_by_name(name)?.set_value(value)?;
        self.set_config(&root)?;

        root.free()
    }
}
