use colored::Colorize;
use examkit_core::question::Question;
use examkit_core::remote::RetryPolicy;
use pdf::ReconstructionMode;

use crate::prelude::{eprintln, println, *};
use crate::remote::{self, RemoteConfig};

/// Longest question text shown in the summary table.
const TABLE_TEXT_WIDTH: usize = 60;

#[derive(Debug, clap::Args)]
pub struct ExtractOptions {
    /// Path to the PDF file
    path: std::path::PathBuf,

    /// Send the document to the remote model instead of parsing it locally
    #[arg(long)]
    remote: bool,

    /// Output a summary table instead of JSON
    #[arg(long)]
    table: bool,

    /// Remote model name
    #[arg(long, env = "EXAMKIT_MODEL", default_value = remote::DEFAULT_MODEL)]
    model: String,

    /// API key for the remote model
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the remote model API
    #[arg(long, env = "EXAMKIT_API_BASE", default_value = remote::DEFAULT_BASE_URL)]
    base_url: String,
}

pub async fn run(options: ExtractOptions, global: crate::Global) -> Result<()> {
    let bytes = crate::input::read_pdf(&options.path)?;

    let spinner = new_spinner();
    let questions = if options.remote {
        let config = RemoteConfig::new(options.api_key, options.model, options.base_url)?;
        let result =
            remote::extract_remote(&config, &bytes, RetryPolicy::default(), Some(&spinner)).await;
        spinner.finish_and_clear();
        result?
    } else {
        let result = pdf::extract_questions_with_outcome(&bytes, &mut |progress| {
            log::debug!("{}", progress);
            set_spinner_msg(Some(&spinner), progress.to_string());
        });
        spinner.finish_and_clear();
        let outcome = result.map_err(|e| eyre!(e))?;

        if outcome.mode == ReconstructionMode::Fallback && !outcome.questions.is_empty() {
            eprintln!(
                "{}",
                "No numbered questions found; showing unnumbered passages with placeholder options."
                    .yellow()
            );
        }
        if global.verbose {
            eprintln!(
                "Parsed {} question(s) in {} mode",
                outcome.questions.len(),
                outcome.mode
            );
        }
        outcome.questions
    };

    if questions.is_empty() {
        return Err(Error::NoQuestions.into());
    }

    if options.table {
        print_table(&questions);
    } else {
        println!("{}", serde_json::to_string_pretty(&questions)?);
    }

    Ok(())
}

fn print_table(questions: &[Question]) {
    let mut table = new_table();
    table.add_row(prettytable::row![
        "#".bold().cyan(),
        "Question".bold().cyan(),
        "Options".bold().cyan(),
        "Image".bold().cyan(),
        "Multi".bold().cyan()
    ]);

    for (i, q) in questions.iter().enumerate() {
        table.add_row(prettytable::row![
            (i + 1).to_string().bright_yellow(),
            truncate(&q.text, TABLE_TEXT_WIDTH),
            q.options.len(),
            image_marker(q),
            if q.multi_select { "yes" } else { "no" }
        ]);
    }

    table.printstd();
}

/// `q` for a question image, `o` for each option image.
fn image_marker(q: &Question) -> String {
    let options = q.options.iter().filter(|o| o.image.is_some()).count();
    match (q.image.is_some(), options) {
        (false, 0) => "-".to_string(),
        (true, 0) => "q".to_string(),
        (false, n) => f!("{}o", n),
        (true, n) => f!("q+{}o", n),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max.saturating_sub(3)).collect();
    f!("{}...", head)
}
