#![allow(unused)]

use crate::prelude::{eprintln, *};
use clap::Parser;
use colored::Colorize;

mod error;
mod extract;
mod input;
mod items;
mod prelude;
mod remote;

/// Exit status when a document parses but holds no recognizable questions.
const EXIT_NO_QUESTIONS: i32 = 2;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Turn exam question papers (PDF) into structured multiple-choice questions"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Whether to display additional information.
    #[clap(long, env = "EXAMKIT_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Extract questions from a PDF
    Extract(crate::extract::ExtractOptions),

    /// Print the merged content stream of a PDF (layout debugging)
    Items(crate::items::ItemsOptions),
}

fn init_logger(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let app = App::parse();
    init_logger(app.global.verbose);

    let result = match app.command {
        SubCommands::Extract(options) => crate::extract::run(options, app.global).await,
        SubCommands::Items(options) => crate::items::run(options, app.global).await,
    };

    if let Err(err) = &result {
        if matches!(err.downcast_ref::<Error>(), Some(Error::NoQuestions)) {
            eprintln!("{}", "No questions detected".yellow());
            std::process::exit(EXIT_NO_QUESTIONS);
        }
    }

    result.map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
