use examkit_core::question::Question;
use thiserror::Error;

use parser::backend::{LopdfBackend, PdfBackend};

pub mod images;
pub mod parser;
pub mod types;

pub use types::*;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Document could not be read: {0}")]
    Unreadable(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Image error: {0}")]
    Image(String),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Extract exam questions from PDF bytes.
///
/// Runs the whole heuristic pipeline: per-page extraction, shadow-text
/// filtering and reading-order merge, then question reconstruction with the
/// chunking fallback. `progress` receives [`Progress`] events in pipeline
/// order. Zero questions is an empty vector, not an error.
pub fn extract_questions(
    bytes: &[u8],
    progress: &mut dyn FnMut(&Progress),
) -> Result<Vec<Question>, PdfError> {
    Ok(extract_questions_with_outcome(bytes, progress)?.questions)
}

/// Like [`extract_questions`], also reporting which reconstruction pass
/// produced the result.
pub fn extract_questions_with_outcome(
    bytes: &[u8],
    progress: &mut dyn FnMut(&Progress),
) -> Result<ReconstructionOutcome, PdfError> {
    let backend = LopdfBackend::load_bytes(bytes)?;
    let items = merged_items(&backend, progress)?;
    let outcome = parser::questions::reconstruct(&items);

    progress(&Progress::Parsed {
        questions: outcome.questions.len(),
        mode: outcome.mode,
    });

    Ok(outcome)
}

/// The merged, shadow-filtered content stream the reconstructor consumes.
pub fn extract_items(bytes: &[u8]) -> Result<Vec<PositionedItem>, PdfError> {
    let backend = LopdfBackend::load_bytes(bytes)?;
    merged_items(&backend, &mut |_| {})
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Extract every page in order and merge the results.
///
/// A page whose content stream cannot be read fails the whole document, so
/// an unreadable file is never mistaken for one without questions.
fn merged_items(
    backend: &dyn PdfBackend,
    progress: &mut dyn FnMut(&Progress),
) -> Result<Vec<PositionedItem>, PdfError> {
    let pages = backend.pages();
    let total = pages.len();
    let mut page_items = Vec::with_capacity(total);

    for (&page, &page_id) in &pages {
        progress(&Progress::PageStarted { page, total });

        let items = parser::content::extract_page_items(backend, page_id).map_err(|e| match e {
            PdfError::Parse(msg) => PdfError::Parse(format!("page {}: {}", page, msg)),
            other => other,
        })?;

        let count = items
            .iter()
            .filter(|item| matches!(item, ContentItem::Image(_)))
            .count();
        progress(&Progress::PageImages { page, count });

        page_items.push((page, items));
    }

    let (merged, removed) = parser::merge::merge_pages(page_items);
    progress(&Progress::ShadowTextFiltered { removed });
    log::debug!("merged {} item(s) from {} page(s)", merged.len(), total);

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object, Stream};

    /// Escape a string for a PDF literal and show it with `Tj`.
    fn show(text: &str) -> String {
        let escaped = text.replace('(', "\\(").replace(')', "\\)");
        format!("({}) Tj", escaped)
    }

    /// Build a one-page PDF with a Helvetica font `/F1` and, optionally, a
    /// 40x40 RGB image `/Im1`.
    fn build_pdf(content: &str, with_image: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        if with_image {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => 40,
                    "Height" => 40,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                },
                vec![90u8; 40 * 40 * 3],
            ));
            resources.set("XObject", dictionary! { "Im1" => image_id });
        }

        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    /// A question with four options, a diagram under the stem, and a short
    /// label printed over the diagram.
    fn exam_pdf() -> Vec<u8> {
        let content = format!(
            "BT /F1 12 Tf 72 700 Td {} 0 -20 Td {} 0 -20 Td {} 0 -20 Td {} 0 -20 Td {} ET \
             q 100 0 0 60 300 630 cm /Im1 Do Q \
             BT /F1 10 Tf 320 660 Td {} ET",
            show("1. What is 2+2?"),
            show("a) 3"),
            show("b) 4"),
            show("c) 5"),
            show("d) 6"),
            show("A"),
        );
        build_pdf(&content, true)
    }

    #[test]
    fn test_extract_questions_end_to_end() {
        let mut events = Vec::new();
        let outcome =
            extract_questions_with_outcome(&exam_pdf(), &mut |p| events.push(p.clone())).unwrap();

        assert_eq!(outcome.mode, ReconstructionMode::Strict);
        assert_eq!(outcome.questions.len(), 1);

        let q = &outcome.questions[0];
        assert_eq!(q.text, "1. What is 2+2?");
        let options: Vec<&str> = q.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(options, vec!["a) 3", "b) 4", "c) 5", "d) 6"]);
        assert!(q
            .image
            .as_deref()
            .is_some_and(|url| url.starts_with("data:image/png;base64,")));
        assert!(q.options.iter().all(|o| o.image.is_none()));

        assert_eq!(
            events,
            vec![
                Progress::PageStarted { page: 1, total: 1 },
                Progress::PageImages { page: 1, count: 1 },
                Progress::ShadowTextFiltered { removed: 1 },
                Progress::Parsed {
                    questions: 1,
                    mode: ReconstructionMode::Strict
                },
            ]
        );
    }

    #[test]
    fn test_extract_is_idempotent_modulo_ids() {
        let bytes = exam_pdf();
        let first = extract_questions(&bytes, &mut |_| {}).unwrap();
        let second = extract_questions(&bytes, &mut |_| {}).unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_ne!(a.id, b.id);
            assert_eq!(a.text, b.text);
            assert_eq!(a.image, b.image);
            let texts = |q: &Question| {
                q.options
                    .iter()
                    .map(|o| (o.text.clone(), o.image.clone()))
                    .collect::<Vec<_>>()
            };
            assert_eq!(texts(a), texts(b));
        }
    }

    #[test]
    fn test_extract_items_reading_order() {
        let items = extract_items(&exam_pdf()).unwrap();
        let kinds: Vec<String> = items
            .iter()
            .map(|p| match &p.item {
                ContentItem::Text(t) => t.content.clone(),
                ContentItem::Image(_) => "<img>".to_string(),
            })
            .collect();
        assert_eq!(kinds, vec!["1. What is 2+2?", "<img>", "a) 3", "b) 4", "c) 5", "d) 6"]);
    }

    #[test]
    fn test_unnumbered_text_falls_back() {
        let content = format!(
            "BT /F1 12 Tf 72 700 Td {} ET",
            show("Read the passage below and answer in your own words.")
        );
        let outcome = extract_questions_with_outcome(&build_pdf(&content, false), &mut |_| {}).unwrap();
        assert_eq!(outcome.mode, ReconstructionMode::Fallback);
        assert_eq!(outcome.questions.len(), 1);
        assert_eq!(outcome.questions[0].options.len(), 4);
    }

    #[test]
    fn test_blank_page_yields_no_questions() {
        let questions = extract_questions(&build_pdf("", false), &mut |_| {}).unwrap();
        assert!(questions.is_empty());
    }

    #[test]
    fn test_flipped_page_keeps_reading_order() {
        // The page flips y once; each line flips back through its Tm, with
        // visual tops at 72, 92, 112 and 132.
        let lines = ["1. What is 2+2?", "a) 3", "b) 4", "c) 5"];
        let mut content = String::from("1 0 0 -1 0 792 cm BT /F1 12 Tf ");
        for (i, line) in lines.iter().enumerate() {
            content.push_str(&format!("1 0 0 -1 72 {} Tm {} ", 72 + 20 * i, show(line)));
        }
        content.push_str("ET q 100 0 0 -60 300 162 cm /Im1 Do Q");
        let bytes = build_pdf(&content, true);

        let items = extract_items(&bytes).unwrap();
        let kinds: Vec<String> = items
            .iter()
            .map(|p| match &p.item {
                ContentItem::Text(t) => t.content.clone(),
                ContentItem::Image(_) => "<img>".to_string(),
            })
            .collect();
        assert_eq!(kinds, vec!["1. What is 2+2?", "a) 3", "<img>", "b) 4", "c) 5"]);

        let outcome = extract_questions_with_outcome(&bytes, &mut |_| {}).unwrap();
        assert_eq!(outcome.mode, ReconstructionMode::Strict);
        assert_eq!(outcome.questions.len(), 1);
        let options: Vec<&str> = outcome.questions[0].options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(options, vec!["a) 3", "b) 4", "c) 5"]);
        assert!(outcome.questions[0].options[0].image.is_some());
    }

    #[test]
    fn test_unreadable_page_content_is_an_error() {
        let content = format!("BT /F1 12 Tf 72 700 Td {} ET BI ] ] >> <<< (unterminated", show("1. Hi"));
        let bytes = build_pdf(&content, false);

        let mut events = Vec::new();
        let err = extract_questions(&bytes, &mut |p| events.push(p.clone())).unwrap_err();
        assert!(matches!(err, PdfError::Parse(ref msg) if msg.starts_with("page 1:")), "{}", err);
        assert!(!events.iter().any(|p| matches!(p, Progress::Parsed { .. })));

        assert!(matches!(extract_items(&bytes), Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_garbage_bytes_are_unreadable() {
        let err = extract_questions(b"not a pdf at all", &mut |_| {}).unwrap_err();
        assert!(matches!(err, PdfError::Unreadable(_)));
    }
}
