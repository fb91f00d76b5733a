//! Image insertion and the upload collaborator.
//!
//! Uploading and inserting are separate steps: the host awaits
//! [`upload_image`] and then calls the insert with whatever selection is
//! current at that moment, which may differ from the one at upload time.

use std::error::Error;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::EditorConfig;
use crate::doc::{Attributes, Doc, InlineKind, NodeId, NodeKind, Style};
use crate::error::EditorError;
use crate::selection::{Position, Selection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub url: String,
}

/// Stores image bytes somewhere reachable and reports the public url.
pub trait ImageUploader {
    fn upload(&self, blob: Vec<u8>) -> impl Future<Output = Result<UploadedImage, Box<dyn Error + Send + Sync>>>;
}

pub async fn upload_image<U: ImageUploader>(uploader: &U, blob: Vec<u8>) -> Result<UploadedImage, EditorError> {
    match uploader.upload(blob).await {
        Ok(image) if !image.url.trim().is_empty() => Ok(image),
        Ok(_) => {
            error!("image upload returned an empty url");
            Err(EditorError::Upload("empty url".to_string()))
        }
        Err(err) => {
            error!(%err, "image upload failed");
            Err(EditorError::Upload(err.to_string()))
        }
    }
}

fn create_image(doc: &mut Doc, config: &EditorConfig, url: &str) -> NodeId {
    doc.create(NodeKind::Inline {
        kind: InlineKind::Image,
        attrs: Attributes::new().with("src", url).with("alt", config.image_alt.as_str()),
        style: Style::new().with("max-width", config.image_max_width.as_str()),
    })
}

/// Replaces the selection with the image; without a selection the image is
/// appended to the end of the document.
pub fn insert_image(doc: &mut Doc, selection: Option<&Selection>, config: &EditorConfig, url: &str) -> Option<Selection> {
    let image = create_image(doc, config, url);
    match selection {
        Some(selection) => {
            let after = doc.replace_range(&selection.range(doc), image)?;
            Some(Selection::collapsed(after))
        }
        None => {
            doc.append_child(doc.root(), image);
            Position::after(doc, image).map(Selection::collapsed)
        }
    }
}

/// Sets the displayed width of an image as a percentage of its container.
pub fn resize_image(doc: &mut Doc, image: NodeId, percent: u8) -> bool {
    if !(1..=100).contains(&percent) {
        debug!(percent, "image width out of range");
        return false;
    }
    if !doc.contains(image) || !doc.is_attached(image) {
        return false;
    }
    match doc.kind_mut(image) {
        NodeKind::Inline { kind: InlineKind::Image, style, .. } => {
            style.set("width", format!("{}%", percent));
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import_export::to_html;
    use crate::testing::{caret_in, parse};
    use pretty_assertions::assert_eq;

    struct FixedUploader(Result<&'static str, &'static str>);

    impl ImageUploader for FixedUploader {
        async fn upload(&self, _blob: Vec<u8>) -> Result<UploadedImage, Box<dyn Error + Send + Sync>> {
            match self.0 {
                Ok(url) => Ok(UploadedImage { url: url.to_string() }),
                Err(msg) => Err(msg.into()),
            }
        }
    }

    #[test]
    fn upload_reports_url() {
        let image = pollster::block_on(upload_image(&FixedUploader(Ok("https://cdn.test/a.png")), vec![1, 2])).unwrap();
        assert_eq!(image.url, "https://cdn.test/a.png");
    }

    #[test]
    fn upload_failure_becomes_editor_error() {
        let err = pollster::block_on(upload_image(&FixedUploader(Err("quota")), vec![])).unwrap_err();
        assert!(matches!(err, EditorError::Upload(ref msg) if msg == "quota"));
        let err = pollster::block_on(upload_image(&FixedUploader(Ok(" ")), vec![])).unwrap_err();
        assert!(matches!(err, EditorError::Upload(_)));
    }

    #[test]
    fn image_replaces_selection() {
        let mut doc = parse("<p>abc</p>");
        let sel = caret_in(&doc, "abc", 1);
        let next = insert_image(&mut doc, Some(&sel), &EditorConfig::default(), "u.png").unwrap();
        assert_eq!(
            to_html(&doc),
            "<p>a<img src=\"u.png\" alt=\"Inserted image\" style=\"max-width: 100%;\">bc</p>"
        );
        assert_eq!(next, Selection::caret(doc.first_child(doc.root()).unwrap(), 2));
    }

    #[test]
    fn image_without_selection_is_appended() {
        let mut doc = parse("<p>abc</p>");
        insert_image(&mut doc, None, &EditorConfig::default(), "u.png").unwrap();
        assert_eq!(
            to_html(&doc),
            "<p>abc</p><img src=\"u.png\" alt=\"Inserted image\" style=\"max-width: 100%;\">"
        );
    }

    #[test]
    fn resize_only_accepts_percentages() {
        let mut doc = parse("<p><img src=\"u.png\"></p>");
        let p = doc.first_child(doc.root()).unwrap();
        let img = doc.first_child(p).unwrap();
        assert!(resize_image(&mut doc, img, 50));
        assert!(!resize_image(&mut doc, img, 0));
        assert!(!resize_image(&mut doc, p, 25));
        assert_eq!(to_html(&doc), "<p><img src=\"u.png\" style=\"width: 50%;\"></p>");
    }
}
