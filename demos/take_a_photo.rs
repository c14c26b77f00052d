use std::{fs::File, io::Write, sync::Arc, time::Duration};

use tether_cam::{cam::Camera, mock::MockDriver, util::CamUtil};

#[tokio::main]
/// This example sets the ISO, takes a photo and saves it in a file.
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut cam = Camera::new(Arc::new(MockDriver::new()));

    cam.init()?;

    println!("Connected to {}", cam.model()?);

    cam.set_config_value("iso", "400")?;

    cam.trigger_capture()?;

    let Some(path) = cam.wait_for_file_added(8).await? else {
        println!("The camera did not report a new file.");
        return Ok(());
    };

    println!("Received an image at {path}! Saving it...");

    let img = cam.download_file(&path.folder, &path.name)?;

    File::create(&path.name)?.write_all(&img)?;

    let preview = cam.capture_preview()?;

    println!("Preview frame: {} bytes", preview.size());

    // Nothing else should be pending, this one times out.
    let event = cam.async_wait_for_event(Duration::from_millis(200))?.await?;
    println!("Last event: {:?}", event.kind);

    cam.exit()?;

    Ok(())
}
