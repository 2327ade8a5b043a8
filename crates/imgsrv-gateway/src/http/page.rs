use axum::{extract::State, response::Html};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;

static INDEX_HTML: &str = include_str!("../../static/index.html");

/// Fill the page template with an HTML-escaped title.
pub fn render(title: &str) -> String {
    INDEX_HTML.replace("{{title}}", &escape(title))
}

/// Serve the viewer page at `GET /`.
///
/// The first request arms the session: a producer blocked on its first
/// frame is released from here.
pub async fn page_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    if state.session.arm() {
        info!("page requested; publisher released");
    }
    Html(state.page.clone())
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_escaped() {
        let page = render("<b>heat & \"flow\"</b>");
        assert!(page.contains("<title>&lt;b&gt;heat &amp; &quot;flow&quot;&lt;/b&gt;</title>"));
        assert!(!page.contains("{{title}}"));
    }

    #[test]
    fn page_connects_to_data_endpoint() {
        let page = render("imgsrv");
        assert!(page.contains("/data"));
    }
}
