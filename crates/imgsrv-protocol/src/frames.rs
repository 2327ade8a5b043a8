use imgsrv_core::types::{Frame, FrameKind};
use serde::{Deserialize, Serialize};

/// Chart path push message.
/// Wire: `{ "plot": "<base64 PNG>" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotMessage {
    pub plot: String,
}

/// Raw-pixel path push message.
/// Wire: `{ "title": "step 12", "image": "<base64 PNG>" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMessage {
    pub title: String,
    pub image: String,
}

/// Any message pushed to a viewer. The schema is fixed and unversioned, so
/// the shape alone tells the two apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViewerMessage {
    Image(ImageMessage),
    Plot(PlotMessage),
}

impl ViewerMessage {
    pub fn from_frame(frame: &Frame) -> Self {
        match frame.kind {
            FrameKind::Image => ViewerMessage::Image(ImageMessage {
                title: frame.title.clone(),
                image: frame.encoded.clone(),
            }),
            FrameKind::Plot => ViewerMessage::Plot(PlotMessage {
                plot: frame.encoded.clone(),
            }),
        }
    }

    /// Serialize once; the same text is sent verbatim to every viewer.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Base64 image payload regardless of shape.
    pub fn payload(&self) -> &str {
        match self {
            ViewerMessage::Image(m) => &m.image,
            ViewerMessage::Plot(m) => &m.plot,
        }
    }
}
