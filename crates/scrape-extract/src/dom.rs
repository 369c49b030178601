use scraper::{Html, Selector};

use crate::filter::{parse_srcset, RawCandidate};
use scrape_types::MediaType;

/// Walks a parsed document collecting every `img`/`video`/`og:` candidate,
/// unresolved and unfiltered. Shared by the static extractor (parses the
/// raw response body) and the headless renderer (parses the live DOM's
/// serialized HTML after JS has run).
pub fn scan(document: &Html) -> Vec<RawCandidate> {
    let mut out = Vec::new();

    scan_images(document, &mut out);
    scan_videos(document, &mut out);
    scan_opengraph(document, &mut out);

    out
}

fn scan_images(document: &Html, out: &mut Vec<RawCandidate>) {
    let selector = Selector::parse("img").expect("static selector");
    for el in document.select(&selector) {
        let value = el.value();
        let title = value.attr("alt").map(str::to_string).filter(|s| !s.is_empty());

        if let Some(src) = value.attr("src").or_else(|| value.attr("data-src")) {
            out.push(RawCandidate {
                url: src.to_string(),
                media_type: MediaType::Image,
                title: title.clone(),
            });
        }

        if let Some(srcset) = value.attr("srcset") {
            for url in parse_srcset(srcset) {
                out.push(RawCandidate {
                    url,
                    media_type: MediaType::Image,
                    title: title.clone(),
                });
            }
        }
    }
}

fn scan_videos(document: &Html, out: &mut Vec<RawCandidate>) {
    let video_selector = Selector::parse("video").expect("static selector");
    let source_selector = Selector::parse("source").expect("static selector");

    for el in document.select(&video_selector) {
        let value = el.value();
        let title = value.attr("title").map(str::to_string).filter(|s| !s.is_empty());

        if let Some(src) = value.attr("src") {
            out.push(RawCandidate {
                url: src.to_string(),
                media_type: MediaType::Video,
                title: title.clone(),
            });
        }

        for source in el.select(&source_selector) {
            if let Some(src) = source.value().attr("src") {
                out.push(RawCandidate {
                    url: src.to_string(),
                    media_type: MediaType::Video,
                    title: title.clone(),
                });
            }
        }
    }
}

fn scan_opengraph(document: &Html, out: &mut Vec<RawCandidate>) {
    let selector = Selector::parse("meta[property]").expect("static selector");
    for el in document.select(&selector) {
        let value = el.value();
        let Some(property) = value.attr("property") else {
            continue;
        };
        let Some(content) = value.attr("content") else {
            continue;
        };

        let media_type = match property {
            "og:image" => MediaType::Image,
            "og:video" => MediaType::Video,
            _ => continue,
        };

        out.push(RawCandidate {
            url: content.to_string(),
            media_type,
            title: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_img_data_src_and_srcset() {
        let html = r#"<html><body>
            <img src="a.jpg" alt="A">
            <img data-src="b.jpg">
            <img srcset="c.jpg 1x, d.jpg 2x">
        </body></html>"#;
        let doc = Html::parse_document(html);
        let found = scan(&doc);
        let urls: Vec<_> = found.iter().map(|c| c.url.as_str()).collect();
        assert!(urls.contains(&"a.jpg"));
        assert!(urls.contains(&"b.jpg"));
        assert!(urls.contains(&"c.jpg"));
        assert!(urls.contains(&"d.jpg"));
    }

    #[test]
    fn collects_video_src_and_nested_source() {
        let html = r#"<html><body>
            <video src="main.mp4"><source src="fallback.webm"></video>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let found = scan(&doc);
        assert_eq!(found.iter().filter(|c| c.media_type == MediaType::Video).count(), 2);
    }

    #[test]
    fn collects_opengraph_meta() {
        let html = r#"<html><head>
            <meta property="og:image" content="https://x/y.jpg">
        </head></html>"#;
        let doc = Html::parse_document(html);
        let found = scan(&doc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://x/y.jpg");
        assert_eq!(found[0].media_type, MediaType::Image);
    }
}
