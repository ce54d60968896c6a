use serde::{Deserialize, Serialize};

use crate::momentum::MomentumRecord;

/// First image-search hit for a product title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMatch {
    pub image_url: String,
    pub search_title: Option<String>,
    /// Page the image was found on; falls back to the image URL itself.
    pub search_link: Option<String>,
}

/// A record paired with its (possibly absent) image match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enriched<T> {
    pub record: T,
    pub image: Option<ImageMatch>,
}

impl<T> Enriched<T> {
    #[must_use]
    pub fn new(record: T, image: Option<ImageMatch>) -> Self {
        Self { record, image }
    }

    /// A record whose search failed or found nothing.
    #[must_use]
    pub fn bare(record: T) -> Self {
        Self {
            record,
            image: None,
        }
    }

    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.image.as_ref().map(|m| m.image_url.as_str())
    }

    #[must_use]
    pub fn search_title(&self) -> Option<&str> {
        self.image.as_ref().and_then(|m| m.search_title.as_deref())
    }

    #[must_use]
    pub fn search_link(&self) -> Option<&str> {
        self.image.as_ref().and_then(|m| m.search_link.as_deref())
    }
}

impl<T> AsRef<T> for Enriched<T> {
    fn as_ref(&self) -> &T {
        &self.record
    }
}

impl AsRef<MomentumRecord> for MomentumRecord {
    fn as_ref(&self) -> &MomentumRecord {
        self
    }
}

pub type EnrichedMomentumRecord = Enriched<MomentumRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_record_has_no_image_fields() {
        let enriched = Enriched::bare("Mug");
        assert_eq!(enriched.image_url(), None);
        assert_eq!(enriched.search_title(), None);
        assert_eq!(enriched.search_link(), None);
    }

    #[test]
    fn accessors_expose_match_fields() {
        let enriched = Enriched::new(
            "Mug",
            Some(ImageMatch {
                image_url: "https://img.example/mug.jpg".to_string(),
                search_title: Some("Ceramic Mug".to_string()),
                search_link: None,
            }),
        );
        assert_eq!(enriched.image_url(), Some("https://img.example/mug.jpg"));
        assert_eq!(enriched.search_title(), Some("Ceramic Mug"));
        assert_eq!(enriched.search_link(), None);
        assert_eq!(*enriched.as_ref(), "Mug");
    }
}
