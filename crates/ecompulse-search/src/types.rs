//! Response shapes for the Custom Search JSON API.

use ecompulse_core::ImageMatch;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<ImageInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    #[serde(default)]
    pub context_link: Option<String>,
}

impl SearchResponse {
    /// The first result as an image match, if it has a link.
    #[must_use]
    pub fn first_match(self) -> Option<ImageMatch> {
        let item = self.items.into_iter().next()?;
        let image_url = item.link?;
        let search_link = item
            .image
            .and_then(|i| i.context_link)
            .unwrap_or_else(|| image_url.clone());
        Some(ImageMatch {
            search_title: item.title,
            search_link: Some(search_link),
            image_url,
        })
    }
}
