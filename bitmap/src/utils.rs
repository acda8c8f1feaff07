use image::RgbaImage;
use palette::PaletteEntry;

use crate::Bitmap;

impl Bitmap {
    /// Expands an 8 bit mip level through `entry`. Alpha is multiplied by
    /// `alpha_scale` and clamped, so translucent palettes can be boosted.
    pub fn to_rgba8(&self, level: usize, entry: &PaletteEntry, alpha_scale: u32) -> Option<RgbaImage> {
        if self.bit_depth != 8 {
            return None;
        }

        let pixels = self.mip(level)?;
        let width = (self.width >> level).max(1);
        let height = (self.height >> level).max(1);
        let pitch = ((self.stride >> level) as usize).max(width as usize);

        if pixels.len() < pitch * (height as usize - 1) + width as usize {
            return None;
        }

        let mut image = RgbaImage::new(width, height);

        image.enumerate_pixels_mut().for_each(|(x, y, pixel)| {
            let color_index = pixels[y as usize * pitch + x as usize];
            let [r, g, b, a] = entry.lookup_rgba(color_index);
            let a = (a as u32).saturating_mul(alpha_scale).min(255) as u8;

            *pixel = [r, g, b, a].into();
        });

        Some(image)
    }
}
