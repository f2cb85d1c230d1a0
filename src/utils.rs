use std::io::Cursor;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Encodes a small gradient image in the given format.
pub fn encode_test_image(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 20) as u8, (y * 20) as u8, 128])
    });

    let mut buff = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buff, format)
        .expect("failed to encode test image");
    buff.into_inner()
}
