use clap::{Parser, Subcommand, ValueEnum};
use kakitori::{
    app_dirs::AppDirs,
    character::Difficulty,
    config::{ConfigStore, FileConfigStore},
    engine::PracticeEngine,
    practice::{CharacterProgress, PracticeDb},
    recognition::Mode,
};
use chrono::Local;
use std::{
    error::Error,
    fs,
    io::{self, Read},
    path::PathBuf,
};
use time_humanize::{Accuracy, HumanTime, Tense};
use tracing_subscriber::EnvFilter;
use unicode_width::UnicodeWidthStr;

/// handwriting practice for hiragana with child-friendly grading
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Grades hand-drawn hiragana from captured stroke data and picks the next character to practice, favouring the ones that need work."
)]
pub struct Cli {
    /// practice database (defaults to ~/.local/state/kakitori/practice.db)
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// config file to load tuning from
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// grade a drawing read from a JSON file (`-` for stdin)
    Evaluate {
        input: String,

        /// character the learner was asked to write
        #[clap(short, long)]
        target: String,

        /// scoring mode (defaults to the configured mode)
        #[clap(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// also record the score as a practice outcome
        #[clap(long)]
        record: bool,

        /// print the result as JSON
        #[clap(long)]
        json: bool,
    },
    /// pick the next character to practice
    Next {
        /// character to leave out of this draw
        #[clap(long)]
        exclude: Option<String>,

        /// only draw from this tier (easy, medium, hard)
        #[clap(long)]
        difficulty: Option<String>,

        /// only draw from this row, e.g. `ka-row`
        #[clap(long)]
        category: Option<String>,

        /// skip the most recently shown characters
        #[clap(long)]
        avoid_recent: bool,

        /// bias the draw by stored practice history
        #[clap(long)]
        progress_weighting: bool,
    },
    /// record a score for a character
    Record { character: String, score: f64 },
    /// show the difficulty tier to practice next
    Recommend,
    /// show per-character practice statistics
    Stats,
    /// write the practice history to a CSV file
    Export { path: PathBuf },
    /// list the supported characters
    Templates,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum ModeArg {
    Strict,
    Lenient,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Strict => Mode::Strict,
            ModeArg::Lenient => Mode::Lenient,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kakitori=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    }
    .load();

    let db_path = cli
        .db
        .clone()
        .or_else(AppDirs::db_path)
        .unwrap_or_else(|| PathBuf::from("kakitori_practice.db"));
    let db = PracticeDb::open(&db_path)?;
    let mut engine = PracticeEngine::new(config, db)?;

    match cli.command {
        Command::Evaluate {
            input,
            target,
            mode,
            record,
            json,
        } => {
            let raw = read_input(&input)?;
            let mode = mode.map(Mode::from).unwrap_or(engine.config().mode);
            let result = engine.evaluate_json(&raw, &target, mode);
            let report = engine.report(&result, &target);
            if record {
                engine.record_outcome(&target, result.score);
            }

            if json {
                let out = serde_json::json!({ "result": result, "report": report });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!(
                    "{} {}  score {:.2}",
                    report.feedback.icon, result.level, result.score
                );
                println!("{}", report.feedback.message);
                println!("{}", report.feedback.encouragement);
                println!("{}", report.suggestion);
            }
        }
        Command::Next {
            exclude,
            difficulty,
            category,
            avoid_recent,
            progress_weighting,
        } => {
            let mut options = engine.config().selection_options();
            options.avoid_recent |= avoid_recent;
            options.use_progress_weighting |= progress_weighting;
            options.category = category;
            options.difficulty = difficulty.and_then(|d| match d.parse::<Difficulty>() {
                Ok(d) => Some(d),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring difficulty filter");
                    None
                }
            });

            let c = engine.select_next_character(exclude.as_deref(), &options);
            println!("{}\t{}\t{}\t{}", c.glyph, c.romaji, c.difficulty, c.category);
        }
        Command::Record { character, score } => {
            engine.record_outcome(&character, score);
            if let Some(weight) = engine.selection_weight(&character) {
                println!("{character}: weight {weight:.2}");
            }
        }
        Command::Recommend => {
            println!("{}", engine.recommended_difficulty());
        }
        Command::Stats => print_stats(&engine)?,
        Command::Export { path } => {
            let count = engine.backend().export_csv(&path)?;
            println!("exported {count} attempts to {}", path.display());
        }
        Command::Templates => {
            for c in engine.store().characters() {
                let strokes = engine
                    .store()
                    .get(&c.glyph)
                    .map(|t| t.stroke_count)
                    .unwrap_or_default();
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    c.glyph, c.romaji, c.difficulty, strokes, c.category
                );
            }
        }
    }

    Ok(())
}

fn read_input(input: &str) -> io::Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        fs::read_to_string(input)
    }
}

/// Right-pads by display width so fullwidth glyphs line up
fn pad(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(UnicodeWidthStr::width(s));
    format!("{s}{}", " ".repeat(fill))
}

fn last_practiced(progress: &CharacterProgress) -> String {
    match progress.days_since_last_practice(Local::now()) {
        Some(days) => HumanTime::from_seconds(-((days * 86_400.0) as i64))
            .to_text_en(Accuracy::Rough, Tense::Past),
        None => "never".to_string(),
    }
}

fn print_stats(engine: &PracticeEngine<PracticeDb>) -> Result<(), Box<dyn Error>> {
    let summary = engine.backend().all_progress()?;
    if summary.is_empty() {
        println!("no practice recorded yet");
        return Ok(());
    }

    let now = Local::now();
    println!(
        "{}{}{}{}last practiced",
        pad("char", 6),
        pad("tries", 7),
        pad("avg", 7),
        pad("weight", 8),
    );
    for row in &summary {
        let avg = row
            .progress
            .average_score
            .map(|a| format!("{a:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let weight = engine
            .selection_weight(&row.character)
            .map(|w| format!("{w:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let mastered = if row.progress.is_mastered(now) { " ✓" } else { "" };
        println!(
            "{}{}{}{}{}{}",
            pad(&row.character, 6),
            pad(&row.progress.attempts.to_string(), 7),
            pad(&avg, 7),
            pad(&weight, 8),
            last_practiced(&row.progress),
            mastered
        );
    }

    for tier in engine.progress_by_difficulty()? {
        println!(
            "{}: {}/{} mastered",
            tier.difficulty, tier.mastered, tier.total
        );
    }
    Ok(())
}
