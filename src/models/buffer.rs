use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ImageSource {
    Captured,
    Uploaded,
}

impl ImageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSource::Captured => "Captured",
            ImageSource::Uploaded => "Uploaded",
        }
    }
}

/// An encoded still image and where it came from.
///
/// Fields are private so a buffer cannot be altered after construction; it is
/// moved from the capture session (or upload adapter) into the recognition job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    data: Vec<u8>,
    content_type: String,
    width: Option<u32>,
    height: Option<u32>,
    source: ImageSource,
}

impl ImageBuffer {
    pub fn new(
        data: Vec<u8>,
        content_type: impl Into<String>,
        dimensions: Option<(u32, u32)>,
        source: ImageSource,
    ) -> Self {
        let (width, height) = match dimensions {
            Some((w, h)) => (Some(w), Some(h)),
            None => (None, None),
        };
        Self {
            data,
            content_type: content_type.into(),
            width,
            height,
            source,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }

    pub fn source(&self) -> ImageSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
