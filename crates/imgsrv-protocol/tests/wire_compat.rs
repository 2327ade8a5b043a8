// Verify the push payloads match what the viewer page parses.
// The schema has no version field, so any change here breaks open pages.

use std::sync::Arc;

use imgsrv_core::types::{Frame, FrameKind};
use imgsrv_protocol::frames::{ImageMessage, PlotMessage, ViewerMessage};

fn frame(kind: FrameKind) -> Frame {
    Frame {
        title: "step 3".to_string(),
        kind,
        width: 2,
        height: 2,
        png: Arc::from(vec![0x89u8, b'P', b'N', b'G']),
        encoded: "iVBORw==".to_string(),
        encoded_at: chrono::Utc::now(),
    }
}

#[test]
fn image_frame_serializes_title_and_image() {
    let json = ViewerMessage::from_frame(&frame(FrameKind::Image))
        .to_json()
        .unwrap();

    assert_eq!(json, r#"{"title":"step 3","image":"iVBORw=="}"#);
}

#[test]
fn plot_frame_serializes_plot_only() {
    let json = ViewerMessage::from_frame(&frame(FrameKind::Plot))
        .to_json()
        .unwrap();

    assert_eq!(json, r#"{"plot":"iVBORw=="}"#);
    // the chart path carries no title on the wire
    assert!(!json.contains("title"));
}

#[test]
fn image_message_parses_back() {
    let json = r#"{"title":"final","image":"AAAA"}"#;
    let msg: ViewerMessage = serde_json::from_str(json).unwrap();

    assert_eq!(
        msg,
        ViewerMessage::Image(ImageMessage {
            title: "final".into(),
            image: "AAAA".into(),
        })
    );
    assert_eq!(msg.payload(), "AAAA");
}

#[test]
fn plot_message_parses_back() {
    let msg: ViewerMessage = serde_json::from_str(r#"{"plot":"BBBB"}"#).unwrap();

    assert_eq!(msg, ViewerMessage::Plot(PlotMessage { plot: "BBBB".into() }));
}

#[test]
fn unknown_shape_rejected() {
    let res: Result<ViewerMessage, _> = serde_json::from_str(r#"{"frame":"CCCC"}"#);
    assert!(res.is_err(), "messages without plot or image must not parse");
}
