//! Reference signatures the recognition job compares against.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::ImageBuffer;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRecord {
    pub id: String,
    pub label: String,
    pub category: String,
    #[serde(skip)]
    pub reference_image: ImageBuffer,
    pub created_at: DateTime<Utc>,
}

/// Operator input for a new reference, before it has an id.
#[derive(Debug, Clone, Default)]
pub struct NewReference {
    pub label: String,
    pub category: String,
    pub reference_image: Option<ImageBuffer>,
}

impl NewReference {
    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty()
            || self.category.trim().is_empty()
            || self.reference_image.is_none()
        {
            bail!("Please fill in all fields and upload a signature");
        }
        Ok(())
    }

    pub fn into_record(self) -> Result<ReferenceRecord> {
        self.validate()?;
        let Some(reference_image) = self.reference_image else {
            bail!("missing reference image");
        };

        Ok(ReferenceRecord {
            id: Uuid::new_v4().to_string(),
            label: self.label.trim().to_string(),
            category: self.category.trim().to_string(),
            reference_image,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageSource;

    fn image() -> ImageBuffer {
        ImageBuffer::new(vec![1, 2, 3], "image/png", Some((1, 1)), ImageSource::Uploaded)
    }

    #[test]
    fn rejects_incomplete_input() {
        let missing_image = NewReference {
            label: "Dr. Ada".into(),
            category: "Cardiology".into(),
            reference_image: None,
        };
        assert!(missing_image.validate().is_err());

        let blank_label = NewReference {
            label: "   ".into(),
            category: "Cardiology".into(),
            reference_image: Some(image()),
        };
        assert!(blank_label.into_record().is_err());
    }

    #[test]
    fn assigns_unique_ids() {
        let make = || NewReference {
            label: " Dr. Ada ".into(),
            category: "Cardiology".into(),
            reference_image: Some(image()),
        };
        let first = make().into_record().unwrap();
        let second = make().into_record().unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(first.label, "Dr. Ada");
    }
}
