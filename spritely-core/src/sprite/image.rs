use std::sync::Arc;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}
impl Rgba {
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Straight-alpha RGBA8 pixel buffer, row major.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Box<[Rgba]>,
}
impl Image {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Rgba::TRANSPARENT)
    }
    #[must_use]
    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![color; len].into_boxed_slice(),
        }
    }
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }
    fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.index_of(x, y).map(|idx| self.pixels[idx])
    }
    /// Set a pixel. Out of bounds writes are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if let Some(idx) = self.index_of(x, y) {
            self.pixels[idx] = color;
        }
    }
    pub fn clear(&mut self, color: Rgba) {
        self.pixels.fill(color);
    }
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
    /// Size of the pixel data in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        std::mem::size_of_val(&*self.pixels)
    }
}

/// The content of one layer at one frame.
///
/// Images are shared and immutable once placed in a cel, copying a cel is cheap.
#[derive(Clone, PartialEq, Debug)]
pub struct Cel {
    pub image: Arc<Image>,
    pub position: (i32, i32),
    pub opacity: u8,
}
impl Cel {
    #[must_use]
    pub fn new(image: Image) -> Self {
        Self {
            image: Arc::new(image),
            position: (0, 0),
            opacity: 255,
        }
    }
    /// Approximate heap + inline size, counting the image even if it is shared with other cels.
    #[must_use]
    pub fn mem_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.image.byte_len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn pixel_bounds() {
        let mut image = Image::new(3, 2);
        image.put_pixel(2, 1, Rgba::WHITE);
        image.put_pixel(3, 1, Rgba::WHITE);
        assert_eq!(image.pixel(2, 1), Some(Rgba::WHITE));
        assert_eq!(image.pixel(0, 0), Some(Rgba::TRANSPARENT));
        assert_eq!(image.pixel(3, 0), None);
        assert_eq!(image.byte_len(), 3 * 2 * 4);
        assert_eq!(image.as_bytes().len(), image.byte_len());
    }
}
