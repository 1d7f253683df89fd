/// Pixel layout tag carried with each frame. The pipeline never inspects pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Yuv420p,
    Gray8,
}

impl PixelFormat {
    /// Bytes a tightly packed `width` x `height` image occupies.
    pub fn buffer_size(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => pixels * 3,
            PixelFormat::Yuv420p => pixels + 2 * ((width as usize).div_ceil(2) * (height as usize).div_ceil(2)),
            PixelFormat::Gray8 => pixels,
        }
    }
}

/// A decoded video frame. Owned by exactly one stage at a time.
#[derive(Debug)]
pub struct Frame {
    pub buffer: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Presentation timestamp in stream time-base units, `None` when unknown.
    pub pts: Option<i64>,
}

impl Frame {
    pub fn new(buffer: Vec<u8>, width: u32, height: u32, format: PixelFormat, pts: Option<i64>) -> Self {
        Self { buffer, width, height, format, pts }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_per_format() {
        assert_eq!(PixelFormat::Rgb24.buffer_size(4, 2), 24);
        assert_eq!(PixelFormat::Gray8.buffer_size(4, 2), 8);
        // Odd dimensions round the chroma planes up.
        assert_eq!(PixelFormat::Yuv420p.buffer_size(3, 3), 9 + 2 * 4);
    }
}
