use std::{io::Read as _, sync::Arc};

use tether_cam::{
    cam::Camera,
    mock::MockDriver,
    settings::{ListingMode, SessionSettings},
};

/// This example walks the camera storage and prints every folder with its files.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let driver = MockDriver::new()
        .with_file("/store_00010001/DCIM/100CANON", "IMG_0001.JPG", vec![0xFFu8; 4096])
        .with_file("/store_00010001/DCIM/100CANON", "IMG_0002.CR2", vec![0xAAu8; 8192])
        .with_folder("/store_00010001/MISC");

    let settings = SessionSettings::default()
        .with_chunk_cap(1024)
        .with_listing_mode(ListingMode::Strict);

    let mut cam = Camera::new_custom(Arc::new(driver), settings);

    cam.init()?;

    for folder in cam.list_folders_recursive("/")? {
        println!("{folder}/");

        for file in cam.list_files(&folder)? {
            let mut reader = cam.file_reader(&folder, &file)?;

            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            reader.close()?;

            println!("    {file} ({} bytes)", data.len());
        }
    }

    cam.exit()?;

    Ok(())
}
