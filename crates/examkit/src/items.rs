use colored::Colorize;
use pdf::{ContentItem, PositionedItem};

use crate::prelude::{println, *};

#[derive(Debug, clap::Args)]
pub struct ItemsOptions {
    /// Path to the PDF file
    path: std::path::PathBuf,

    /// Output as JSON (includes full image data URLs)
    #[arg(long)]
    json: bool,
}

/// Print the merged content stream the question reconstructor sees.
pub async fn run(options: ItemsOptions, _global: crate::Global) -> Result<()> {
    let bytes = crate::input::read_pdf(&options.path)?;
    let items = pdf::extract_items(&bytes).map_err(|e| eyre!(e))?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    let mut table = new_table();
    table.add_row(prettytable::row![
        "Page".bold().cyan(),
        "Kind".bold().cyan(),
        "X".bold().cyan(),
        "Y".bold().cyan(),
        "W".bold().cyan(),
        "H".bold().cyan(),
        "Content".bold().cyan()
    ]);
    for item in &items {
        table.add_row(item_row(item));
    }
    table.printstd();

    Ok(())
}

fn item_row(positioned: &PositionedItem) -> prettytable::Row {
    match &positioned.item {
        ContentItem::Text(run) => prettytable::row![
            positioned.page,
            "text",
            f!("{:.1}", run.x),
            f!("{:.1}", run.y),
            f!("{:.1}", run.width),
            f!("{:.1}", run.height),
            describe(&positioned.item)
        ],
        ContentItem::Image(image) => prettytable::row![
            positioned.page,
            "image".bright_magenta(),
            f!("{:.1}", image.x),
            f!("{:.1}", image.y),
            f!("{:.1}", image.width),
            f!("{:.1}", image.height),
            describe(&positioned.item)
        ],
    }
}

/// One-line description of an item's payload.
fn describe(item: &ContentItem) -> String {
    match item {
        ContentItem::Text(run) if run.ends_line => f!("{} \u{21b5}", run.content),
        ContentItem::Text(run) => run.content.clone(),
        ContentItem::Image(image) => f!("<png data url, {} bytes>", image.data_url.len()),
    }
}
