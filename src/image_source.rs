//! An [ImageSource] names the image a render resource is built from, and doubles as the cache key.
//!
//! Sources come in two shapes: pixels that are already decoded and sitting in memory, and a URI
//! that still has to be fetched by a retriever.  The two behave differently under equality: a URI
//! is a value, so two sources naming the same URI are the same key, while a pixel buffer is
//! content-addressed by identity.  Cloning a pixel source yields the same key; decoding the same
//! image twice yields two distinct keys.  Either way a key stays stable for as long as the source
//! is alive, which is what the cache's index needs.
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Decoded image pixels, as handed over by whatever did the decoding.
///
/// The cache never looks inside `pixels`; it only needs the byte count for budgeting.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> ImageData {
        ImageData {
            width,
            height,
            pixels,
        }
    }

    /// Size of the decoded representation in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.pixels.len() as u64
    }
}

/// Where an image comes from: inline pixels or a remote descriptor.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Already-decoded pixels.  Compared and hashed by buffer identity, not contents.
    Pixels(Arc<ImageData>),
    /// A URI to hand to the retriever.  Compared and hashed by value.
    Url(String),
}

impl ImageSource {
    pub fn from_pixels(image: ImageData) -> ImageSource {
        ImageSource::Pixels(Arc::new(image))
    }

    pub fn from_url(url: impl Into<String>) -> ImageSource {
        ImageSource::Url(url.into())
    }

    /// The inline pixel buffer, if this source carries one.
    pub fn pixels(&self) -> Option<&Arc<ImageData>> {
        match self {
            ImageSource::Pixels(ref image) => Some(image),
            ImageSource::Url(_) => None,
        }
    }

    pub fn is_pixels(&self) -> bool {
        matches!(self, ImageSource::Pixels(_))
    }

    pub fn is_url(&self) -> bool {
        matches!(self, ImageSource::Url(_))
    }
}

impl PartialEq for ImageSource {
    fn eq(&self, other: &ImageSource) -> bool {
        match (self, other) {
            (ImageSource::Pixels(a), ImageSource::Pixels(b)) => Arc::ptr_eq(a, b),
            (ImageSource::Url(a), ImageSource::Url(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ImageSource {}

impl Hash for ImageSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ImageSource::Pixels(image) => {
                state.write_u8(0);
                (Arc::as_ptr(image) as usize).hash(state);
            }
            ImageSource::Url(url) => {
                state.write_u8(1);
                url.hash(state);
            }
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ImageSource::Pixels(image) => {
                write!(f, "pixels {}x{}", image.width, image.height)
            }
            ImageSource::Url(url) => f.write_str(url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn white_2x2() -> ImageData {
        ImageData::new(2, 2, vec![0xff; 16])
    }

    #[test]
    fn url_sources_compare_by_value() {
        let a = ImageSource::from_url("https://example.com/tile.png");
        let b = ImageSource::from_url(String::from("https://example.com/tile.png"));
        let c = ImageSource::from_url("https://example.com/other.png");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn pixel_sources_compare_by_identity() {
        let a = ImageSource::from_pixels(white_2x2());
        let b = ImageSource::from_pixels(white_2x2());
        // Identical bytes, distinct buffers: different keys.
        assert_ne!(a, b);
        // A clone shares the buffer and therefore the key.
        assert_eq!(a, a.clone());
    }

    #[test]
    fn pixel_and_url_never_compare_equal() {
        let a = ImageSource::from_pixels(white_2x2());
        let b = ImageSource::from_url("pixels 2x2");
        assert_ne!(a, b);
    }

    #[test]
    fn sources_work_as_map_keys() {
        let mut map = HashMap::new();
        let pixels = ImageSource::from_pixels(white_2x2());
        let url = ImageSource::from_url("https://example.com/tile.png");

        map.insert(pixels.clone(), 1);
        map.insert(url.clone(), 2);

        assert_eq!(map.get(&pixels), Some(&1));
        assert_eq!(map.get(&pixels.clone()), Some(&1));
        assert_eq!(map.get(&url), Some(&2));
        assert_eq!(map.get(&ImageSource::from_pixels(white_2x2())), None);
    }

    #[test]
    fn image_data_reports_pixel_bytes() {
        assert_eq!(white_2x2().size_bytes(), 16);
    }
}
