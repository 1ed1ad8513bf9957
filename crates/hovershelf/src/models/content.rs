use super::role::Role;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<Role>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    /// Base64 encoded image bytes
    pub data: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<Role>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
/// Content returned by a tool, or passed to and from an LLM
pub enum Content {
    Text(TextContent),
    Image(ImageContent),
}

impl Content {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Content::Text(TextContent {
            text: text.into(),
            audience: None,
        })
    }

    pub fn image<S: Into<String>, T: Into<String>>(data: S, mime_type: T) -> Self {
        Content::Image(ImageContent {
            data: data.into(),
            mime_type: mime_type.into(),
            audience: None,
        })
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn with_audience(mut self, audience: Vec<Role>) -> Self {
        match &mut self {
            Content::Text(text) => text.audience = Some(audience),
            Content::Image(image) => image.audience = Some(audience),
        }
        self
    }

    pub fn audience(&self) -> Option<&Vec<Role>> {
        match self {
            Content::Text(text) => text.audience.as_ref(),
            Content::Image(image) => image.audience.as_ref(),
        }
    }

    /// A copy of this content with the annotations removed, as sent to the model
    pub fn unannotated(&self) -> Self {
        match self {
            Content::Text(text) => Content::text(text.text.clone()),
            Content::Image(image) => Content::image(image.data.clone(), image.mime_type.clone()),
        }
    }

    /// Short human readable rendering, images are summarized instead of dumped
    pub fn summary(&self) -> String {
        match self {
            Content::Text(text) => text.text.clone(),
            Content::Image(image) => {
                format!("[image: {}, {} bytes base64]", image.mime_type, image.data.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_serializes_with_type_tag() {
        let content = Content::text("hello");
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "hello"}));

        let image = Content::image("aGk=", "image/png");
        let value = serde_json::to_value(&image).unwrap();
        assert_eq!(
            value,
            json!({"type": "image", "data": "aGk=", "mimeType": "image/png"})
        );
    }

    #[test]
    fn test_unannotated_drops_audience() {
        let content = Content::text("secret").with_audience(vec![Role::User]);
        assert_eq!(content.audience(), Some(&vec![Role::User]));
        assert_eq!(content.unannotated().audience(), None);
    }

    #[test]
    fn test_image_summary_does_not_include_data() {
        let image = Content::image("QUJDRA==", "image/png");
        let summary = image.summary();
        assert!(summary.contains("image/png"));
        assert!(!summary.contains("QUJDRA=="));
    }
}
