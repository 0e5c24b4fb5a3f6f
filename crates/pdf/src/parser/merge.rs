//! Spatial Deduplicator / Merger.
//!
//! Drops the short text fragments that PDF producers often lay over images
//! (labels, invisible OCR layers) and flattens every page into one stream in
//! reading order.

use std::cmp::Ordering;

use crate::types::{ContentItem, ImageBlock, PositionedItem, TextRun};

/// Text shorter than this (in trimmed characters) is a shadow candidate.
pub const SHADOW_TEXT_MAX_CHARS: usize = 5;

/// Closed-interval overlap of a text run and an image.
///
/// All coordinates are PDF user space (y grows upward). A text run occupies
/// `[y, y + height]` above its baseline; an image is anchored at its top
/// edge and occupies `[y - height, y]`.
pub fn overlaps(text: &TextRun, image: &ImageBlock) -> bool {
    let x_overlap = text.x <= image.x + image.width && image.x <= text.x + text.width;
    let y_overlap = text.y <= image.y && image.y - image.height <= text.y + text.height;
    x_overlap && y_overlap
}

fn is_shadow(text: &TextRun, images: &[&ImageBlock]) -> bool {
    text.content.trim().chars().count() < SHADOW_TEXT_MAX_CHARS
        && images.iter().any(|image| overlaps(text, image))
}

/// Remove short text runs that overlap any image on the same page.
///
/// Returns the surviving items in their original order and the number of
/// runs removed.
pub fn filter_shadow_text(items: Vec<ContentItem>) -> (Vec<ContentItem>, usize) {
    let images: Vec<&ImageBlock> = items
        .iter()
        .filter_map(|item| match item {
            ContentItem::Image(image) => Some(image),
            ContentItem::Text(_) => None,
        })
        .collect();

    if images.is_empty() {
        return (items, 0);
    }

    let shadow: Vec<bool> = items
        .iter()
        .map(|item| matches!(item, ContentItem::Text(text) if is_shadow(text, &images)))
        .collect();
    let removed = shadow.iter().filter(|s| **s).count();

    let kept = items
        .into_iter()
        .zip(shadow)
        .filter(|(_, is_shadow)| !is_shadow)
        .map(|(item, _)| item)
        .collect();

    (kept, removed)
}

/// Reading order: page ascending, then top to bottom, then left to right.
///
/// `y` is page-local, so the page number must lead the key.
pub fn reading_order(a: &PositionedItem, b: &PositionedItem) -> Ordering {
    a.page
        .cmp(&b.page)
        .then_with(|| b.item.y().total_cmp(&a.item.y()))
        .then_with(|| a.item.x().total_cmp(&b.item.x()))
}

/// Filter shadow text page by page, then merge every page into one
/// stream sorted by [`reading_order`].
///
/// The sort is stable: items with identical coordinates keep their
/// content-stream order. Returns the merged stream and the total number of
/// text runs removed.
pub fn merge_pages(pages: Vec<(u32, Vec<ContentItem>)>) -> (Vec<PositionedItem>, usize) {
    let mut merged = Vec::new();
    let mut removed_total = 0;

    for (page, items) in pages {
        let (kept, removed) = filter_shadow_text(items);
        removed_total += removed;
        merged.extend(kept.into_iter().map(|item| PositionedItem { page, item }));
    }

    merged.sort_by(reading_order);
    (merged, removed_total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(content: &str, x: f32, y: f32) -> ContentItem {
        ContentItem::Text(TextRun {
            content: content.to_string(),
            x,
            y,
            width: content.chars().count() as f32 * 6.0,
            height: 12.0,
            ends_line: true,
        })
    }

    fn image(x: f32, y: f32, width: f32, height: f32) -> ContentItem {
        ContentItem::Image(ImageBlock {
            data_url: "data:image/png;base64,AAAA".to_string(),
            x,
            y,
            width,
            height,
        })
    }

    fn contents(items: &[PositionedItem]) -> Vec<String> {
        items
            .iter()
            .map(|p| match &p.item {
                ContentItem::Text(t) => t.content.clone(),
                ContentItem::Image(_) => "<img>".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_short_overlapping_text_is_removed() {
        // Image covers x 100..300, y 400..600.
        let items = vec![image(100.0, 600.0, 200.0, 200.0), text("A", 150.0, 500.0)];
        let (kept, removed) = filter_shadow_text(items);
        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 1);
        assert!(matches!(kept[0], ContentItem::Image(_)));
    }

    #[test]
    fn test_short_distant_text_survives() {
        let items = vec![image(100.0, 600.0, 200.0, 200.0), text("A", 400.0, 100.0)];
        let (kept, removed) = filter_shadow_text(items);
        assert_eq!(removed, 0);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_long_overlapping_text_survives() {
        let items = vec![
            image(100.0, 600.0, 200.0, 200.0),
            text("Figure caption", 150.0, 500.0),
        ];
        let (_, removed) = filter_shadow_text(items);
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_length_uses_trimmed_content() {
        let items = vec![image(100.0, 600.0, 200.0, 200.0), text("  AB  ", 150.0, 500.0)];
        let (_, removed) = filter_shadow_text(items);
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_touching_edges_count_as_overlap() {
        // Text baseline sits exactly on the image's bottom edge.
        let items = vec![image(100.0, 600.0, 200.0, 200.0), text("x", 300.0, 388.0)];
        let (_, removed) = filter_shadow_text(items);
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_images_only_affect_their_own_page() {
        let pages = vec![
            (1, vec![image(100.0, 600.0, 200.0, 200.0)]),
            (2, vec![text("A", 150.0, 500.0)]),
        ];
        let (merged, removed) = merge_pages(pages);
        assert_eq!(removed, 0);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_sorts_top_to_bottom_then_left_to_right() {
        let pages = vec![(
            1,
            vec![
                text("b) 4", 72.0, 660.0),
                text("1. What is 2+2?", 72.0, 700.0),
                text("a) 3", 72.0, 680.0),
                text("right", 300.0, 700.0),
            ],
        )];
        let (merged, _) = merge_pages(pages);
        assert_eq!(
            contents(&merged),
            vec!["1. What is 2+2?", "right", "a) 3", "b) 4"]
        );
    }

    #[test]
    fn test_merge_keeps_page_order_first() {
        let pages = vec![
            (1, vec![text("page one low", 72.0, 100.0)]),
            (2, vec![text("page two high", 72.0, 750.0)]),
        ];
        let (merged, _) = merge_pages(pages);
        assert_eq!(contents(&merged), vec!["page one low", "page two high"]);
        assert_eq!(merged[1].page, 2);
    }

    #[test]
    fn test_merge_is_stable_for_equal_positions() {
        let pages = vec![(
            1,
            vec![text("first", 72.0, 500.0), text("second", 72.0, 500.0)],
        )];
        let (merged, _) = merge_pages(pages);
        assert_eq!(contents(&merged), vec!["first", "second"]);
    }
}
