mod config;
mod db;
mod diagnostic;
mod error;
mod interactive;
mod knowledge;
mod models;
mod pool;
mod scheduler;
mod state;
mod tui;

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use config::Config;
use db::Database;
use diagnostic::DiagnosticSelector;
use interactive::DiagnosticExit;
use models::{Flashcard, FlashcardProgress, JsonOutput, KnowledgeState};
use pool::Rejected;
use scheduler::{format_interval, preview_all, Quality, ReviewSession};
use state::LearnerState;

#[derive(Parser)]
#[command(name = "adept")]
#[command(about = "Adaptive diagnostics, mastery tracking and SM-2 flashcard review")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Track topic knowledge
    #[command(subcommand)]
    Topic(TopicCommands),

    /// Roll up mastery over a set of topics
    Section {
        /// Topic IDs in the section
        #[arg(required = true)]
        topics: Vec<String>,
    },

    /// Run (or resume) an adaptive diagnostic
    Diagnostic {
        /// Question pool (JSON)
        #[arg(long, short, required_unless_present = "abandon")]
        pool: Option<PathBuf>,

        /// Subject being diagnosed
        #[arg(long, short, default_value = "general")]
        subject: String,

        /// Seed for question selection
        #[arg(long)]
        seed: Option<u64>,

        /// Discard the diagnostic in progress
        #[arg(long, conflicts_with = "pool")]
        abandon: bool,
    },

    /// Manage flashcard progress
    #[command(subcommand)]
    Card(CardCommands),

    /// Review a flashcard pool interactively
    Study {
        /// Flashcard pool (JSON)
        #[arg(long, short)]
        pool: PathBuf,

        /// Topic the cards belong to
        #[arg(long, short)]
        topic: String,

        /// Subject the cards belong to
        #[arg(long, short, default_value = "general")]
        subject: String,
    },

    /// Show learning statistics
    Stats,

    /// Write the learner snapshot as JSON
    Export {
        /// Output file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Replace the learner snapshot from a JSON file
    Import {
        /// Snapshot file
        file: PathBuf,
    },

    /// Launch interactive terminal UI
    Tui,
}

#[derive(Subcommand)]
enum TopicCommands {
    /// List tracked topics
    List,

    /// Show one topic
    Show {
        /// Topic ID
        topic: String,
    },

    /// Record a single answer
    Answer {
        /// Topic ID
        topic: String,

        #[arg(long, conflicts_with = "incorrect", required_unless_present = "incorrect")]
        correct: bool,

        #[arg(long)]
        incorrect: bool,
    },

    /// Record a quiz result, replacing the topic's score
    Quiz {
        /// Topic ID
        topic: String,

        /// Correct answers
        #[arg(
            long,
            requires = "total",
            conflicts_with = "answers",
            required_unless_present = "answers"
        )]
        correct: Option<u32>,

        /// Questions asked
        #[arg(long, requires = "correct")]
        total: Option<u32>,

        /// Per-question outcomes, e.g. 1,0,1
        #[arg(long, value_delimiter = ',', value_parser = parse_outcome)]
        answers: Vec<bool>,
    },

    /// Record a final test; each answer adds to its topic
    Final {
        /// Answers as topic:outcome, e.g. fractions:1 decimals:0
        #[arg(required = true, value_parser = parse_final_answer)]
        answers: Vec<(String, bool)>,
    },
}

#[derive(Subcommand)]
enum CardCommands {
    /// Record a review for a card
    Review {
        /// Card ID
        card: String,

        /// Quality: 0-5 or dont-know/forgot/good/easy
        #[arg(long, short)]
        quality: String,

        /// Topic the card belongs to
        #[arg(long, short)]
        topic: String,

        /// Subject the card belongs to
        #[arg(long, short, default_value = "general")]
        subject: String,
    },

    /// List cards due today
    Due {
        /// Maximum number of cards
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show the interval each grade would give
    Preview {
        /// Card ID
        card: String,
    },

    /// Show flashcard statistics
    Stats,

    /// Validate a flashcard pool
    Check {
        /// Flashcard pool (JSON)
        #[arg(long, short)]
        pool: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_logging(&config.log_filter);

    if let Err(e) = run(cli, config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn print_json<T: Serialize>(data: T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(&JsonOutput::ok(data))?);
    Ok(())
}

fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn parse_quality(s: &str) -> Result<Quality, String> {
    Quality::from_str(s).ok_or_else(|| {
        format!(
            "Invalid quality '{}'. Use 0-5 or dont-know/forgot/good/easy",
            s
        )
    })
}

fn parse_outcome(s: &str) -> Result<bool, String> {
    match s.trim().to_lowercase().as_str() {
        "1" | "y" | "yes" | "true" | "correct" => Ok(true),
        "0" | "n" | "no" | "false" | "incorrect" | "wrong" => Ok(false),
        other => Err(format!("Invalid outcome '{}'. Use 1/0 or correct/incorrect", other)),
    }
}

fn parse_final_answer(s: &str) -> Result<(String, bool), String> {
    let (topic, outcome) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("Invalid answer '{}'. Use topic:outcome", s))?;
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(format!("Missing topic in '{}'", s));
    }
    Ok((topic.to_string(), parse_outcome(outcome)?))
}

fn report_rejected(rejected: &[Rejected]) {
    for r in rejected {
        eprintln!(
            "Skipped {}: {}",
            r.id.as_deref().unwrap_or("item without id"),
            r.reason
        );
    }
}

fn run(cli: Cli, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(dir) = config.db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let db = Database::open(&config.db_path)?;
    db.init()?;

    match cli.command {
        Commands::Init => {
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Database initialized at: {}", config.db_path.display());
            }
        }

        Commands::Topic(topic_cmd) => match topic_cmd {
            TopicCommands::List => {
                let state = db.load_snapshot()?;
                let topics: Vec<&KnowledgeState> = state.knowledge_states.values().collect();
                if cli.json {
                    print_json(&topics)?;
                } else if topics.is_empty() {
                    println!("No topics tracked yet.");
                } else {
                    println!("{:<30} {:>6} {:>9} {:>8}  LEVEL", "TOPIC", "SCORE", "ANSWERS", "ATTEMPTS");
                    println!("{}", "-".repeat(70));
                    for k in topics {
                        println!(
                            "{:<30} {:>5}% {:>4}/{:<4} {:>8}  {}",
                            truncate(&k.topic_id, 28),
                            k.score,
                            k.correct_answers,
                            k.total_answers,
                            k.attempts,
                            k.mastery_level.label()
                        );
                    }
                }
            }

            TopicCommands::Show { topic } => {
                let state = db.load_snapshot()?;
                let Some(k) = state.knowledge(&topic) else {
                    return Err(format!("Topic not found: {}", topic).into());
                };
                if cli.json {
                    print_json(k)?;
                } else {
                    print_knowledge(k);
                }
            }

            TopicCommands::Answer {
                topic,
                correct,
                incorrect: _,
            } => {
                let mut state = db.load_snapshot()?;
                let updated = state.record_answer(&topic, correct, Utc::now()).clone();
                db.save_snapshot(&state)?;
                if cli.json {
                    print_json(&updated)?;
                } else {
                    println!(
                        "Recorded {} answer for '{}': {}% ({})",
                        if correct { "correct" } else { "incorrect" },
                        topic,
                        updated.score,
                        updated.mastery_level.label()
                    );
                }
            }

            TopicCommands::Quiz {
                topic,
                correct,
                total,
                answers,
            } => {
                let mut state = db.load_snapshot()?;
                let now = Utc::now();
                let updated = match (correct, total) {
                    (Some(correct), Some(total)) => {
                        state.set_topic_score(&topic, correct, total, now)?
                    }
                    _ => state.record_quiz(&topic, &answers, now)?,
                }
                .clone();
                db.save_snapshot(&state)?;
                if cli.json {
                    print_json(&updated)?;
                } else {
                    println!(
                        "Quiz recorded for '{}': {}/{} = {}% ({})",
                        topic,
                        updated.correct_answers,
                        updated.total_answers,
                        updated.score,
                        updated.mastery_level.label()
                    );
                }
            }

            TopicCommands::Final { answers } => {
                let mut state = db.load_snapshot()?;
                state.record_answers(
                    answers.iter().map(|(topic, correct)| (topic.as_str(), *correct)),
                    Utc::now(),
                );
                db.save_snapshot(&state)?;

                let mut topics: Vec<&str> = Vec::new();
                for (topic, _) in &answers {
                    if !topics.contains(&topic.as_str()) {
                        topics.push(topic);
                    }
                }
                let updated: Vec<&KnowledgeState> =
                    topics.iter().filter_map(|t| state.knowledge(t)).collect();

                if cli.json {
                    print_json(&updated)?;
                } else {
                    println!("Final test recorded: {} answers", answers.len());
                    for k in updated {
                        println!(
                            "  {:<30} {:>3}% ({})",
                            truncate(&k.topic_id, 28),
                            k.score,
                            k.mastery_level.label()
                        );
                    }
                }
            }
        },

        Commands::Section { topics } => {
            let state = db.load_snapshot()?;
            let mastery = state.section_mastery(&topics);
            if cli.json {
                print_json(mastery)?;
            } else {
                let attempted = topics
                    .iter()
                    .filter(|t| state.knowledge(t).map_or(false, |k| k.attempts > 0))
                    .count();
                println!(
                    "Section mastery: {}% ({}), {} of {} topics attempted",
                    mastery.score,
                    mastery.level.label(),
                    attempted,
                    topics.len()
                );
            }
        }

        Commands::Diagnostic {
            pool,
            subject,
            seed,
            abandon,
        } => {
            let mut state = db.load_snapshot()?;

            if abandon {
                let in_progress = state
                    .diagnostic_session
                    .as_ref()
                    .map_or(false, |s| !s.is_completed());
                let dropped = if in_progress {
                    state.abandon_diagnostic()
                } else {
                    None
                };
                db.save_snapshot(&state)?;
                match dropped {
                    Some(session) if cli.json => print_json(&session)?,
                    Some(session) => println!(
                        "Abandoned diagnostic {} after {} answers",
                        session.id,
                        session.answers.len()
                    ),
                    None if cli.json => print_json(())?,
                    None => println!("No diagnostic in progress."),
                }
                return Ok(());
            }

            let Some(pool) = pool else {
                return Err("--pool is required".into());
            };
            let (questions, rejected) =
                pool::split(pool::parse_questions(&std::fs::read_to_string(&pool)?)?);
            report_rejected(&rejected);

            let rng = make_rng(config.with_seed(seed).seed);
            let selector = match state.diagnostic_session.clone() {
                Some(session) if !session.is_completed() && session.subject_id == subject => {
                    DiagnosticSelector::resume(session, questions, rng)?
                }
                _ => DiagnosticSelector::new(&subject, questions, rng, Utc::now()),
            };

            // Keep stdout clean for the JSON result
            let mut output: Box<dyn Write> = if cli.json {
                Box::new(io::stderr())
            } else {
                Box::new(io::stdout())
            };
            let mut input = io::stdin().lock();

            match interactive::run_diagnostic(selector, &mut input, &mut output)? {
                DiagnosticExit::Finished(report) => {
                    state.apply_diagnostic(&report, Utc::now());
                    db.save_snapshot(&state)?;
                    if cli.json {
                        print_json(&report)?;
                    } else {
                        println!("{:<24} {:>9} {:>6} {:>11}  LEVEL", "SECTION", "ANSWERS", "SCORE", "CONFIDENCE");
                        println!("{}", "-".repeat(65));
                        for s in &report.sections {
                            println!(
                                "{:<24} {:>4}/{:<4} {:>5}% {:>10.2}  {}",
                                truncate(&s.section_id, 22),
                                s.correct_answers,
                                s.total_answers,
                                s.score,
                                s.confidence,
                                s.mastery_level.label()
                            );
                        }
                    }
                }
                DiagnosticExit::Paused(session) => {
                    let answered = session.answers.len();
                    state.diagnostic_session = Some(session);
                    db.save_snapshot(&state)?;
                    if cli.json {
                        print_json(&state.diagnostic_session)?;
                    } else {
                        println!(
                            "Diagnostic paused after {} answers. Run it again to resume.",
                            answered
                        );
                    }
                }
            }
        }

        Commands::Card(card_cmd) => match card_cmd {
            CardCommands::Review {
                card,
                quality,
                topic,
                subject,
            } => {
                let quality = parse_quality(&quality)?;
                let mut state = db.load_snapshot()?;
                let updated = state
                    .review_card(&card, &topic, &subject, quality, today())
                    .clone();
                db.save_snapshot(&state)?;
                if cli.json {
                    print_json(&updated)?;
                } else {
                    println!(
                        "Reviewed '{}' ({}). Next review: {} (in {})",
                        card,
                        quality.label(),
                        updated.next_review_date,
                        format_interval(updated.interval)
                    );
                }
            }

            CardCommands::Due { limit } => {
                let state = db.load_snapshot()?;
                let mut due = state.due_cards(today());
                if let Some(limit) = limit {
                    due.truncate(limit);
                }
                if cli.json {
                    print_json(&due)?;
                } else if due.is_empty() {
                    match state.upcoming_cards(today()).first() {
                        Some(next) => println!(
                            "No cards due. Next up: '{}' on {}",
                            next.card_id, next.next_review_date
                        ),
                        None => println!("No cards due. Nice work!"),
                    }
                } else {
                    println!("{:<24} {:<20} {:>5} {:>8}  NEXT", "CARD", "TOPIC", "EASE", "INTERVAL");
                    println!("{}", "-".repeat(72));
                    for c in due {
                        println!(
                            "{:<24} {:<20} {:>5.2} {:>8}  {}",
                            truncate(&c.card_id, 22),
                            truncate(&c.topic_id, 18),
                            c.ease_factor,
                            format_interval(c.interval),
                            c.next_review_date
                        );
                    }
                }
            }

            CardCommands::Preview { card } => {
                let state = db.load_snapshot()?;
                let progress = state
                    .flashcard_progress
                    .get(&card)
                    .cloned()
                    .unwrap_or_else(|| FlashcardProgress::new(&card, "", "", today()));
                let previews = preview_all(&progress);
                if cli.json {
                    let data: Vec<_> = previews
                        .iter()
                        .map(|(q, days)| {
                            serde_json::json!({
                                "quality": q.value(),
                                "label": q.label(),
                                "interval": days,
                            })
                        })
                        .collect();
                    print_json(data)?;
                } else {
                    for (q, days) in previews {
                        println!("[{}] {:<11} {}", q.value(), q.label(), format_interval(days));
                    }
                }
            }

            CardCommands::Stats => {
                let state = db.load_snapshot()?;
                let stats = state.card_stats(today());
                if cli.json {
                    print_json(&stats)?;
                } else {
                    println!("Flashcards");
                    println!("==========");
                    println!("Total:      {}", stats.total);
                    println!("New:        {}", stats.new_cards);
                    println!("Learning:   {}", stats.learning);
                    println!("Mastered:   {}", stats.mastered);
                    println!("Due today:  {}", stats.due_today);
                    println!("Avg ease:   {:.2}", stats.average_ease_factor);
                }
            }

            CardCommands::Check { pool } => {
                let (cards, rejected) =
                    pool::split(pool::parse_flashcards(&std::fs::read_to_string(&pool)?)?);
                if cli.json {
                    print_json(serde_json::json!({
                        "valid": cards.len(),
                        "rejected": rejected,
                    }))?;
                } else {
                    println!("{} valid, {} rejected", cards.len(), rejected.len());
                    for r in &rejected {
                        println!("  {}: {}", r.id.as_deref().unwrap_or("-"), r.reason);
                    }
                }
            }
        },

        Commands::Study {
            pool,
            topic,
            subject,
        } => {
            let (cards, rejected) =
                pool::split(pool::parse_flashcards(&std::fs::read_to_string(&pool)?)?);
            report_rejected(&rejected);

            let today = today();
            let mut state = db.load_snapshot()?;
            let ids: Vec<String> = cards.iter().map(|c| c.id.clone()).collect();
            let deck: HashMap<String, Flashcard> =
                cards.into_iter().map(|c| (c.id.clone(), c)).collect();
            let mut session = ReviewSession::for_pool(&state, &ids, &topic, &subject, today);

            if session.is_finished() {
                println!("Nothing to review in this pool today.");
                return Ok(());
            }

            let mut input = io::stdin().lock();
            let mut output = io::stdout();
            interactive::run_study(&mut session, &mut state, &deck, &mut input, &mut output, today)?;
            db.save_snapshot(&state)?;
        }

        Commands::Stats => {
            let state = db.load_snapshot()?;
            let overall = state.overall_mastery();
            let cards = state.card_stats(today());
            let weak: Vec<&KnowledgeState> = state.weak_topics();
            let diagnostics = db.completed_diagnostics()?;

            if cli.json {
                print_json(serde_json::json!({
                    "overall": overall,
                    "topics": state.knowledge_states.len(),
                    "weakTopics": weak,
                    "cards": cards,
                    "diagnosticsCompleted": diagnostics,
                }))?;
            } else {
                println!("Learning Statistics");
                println!("===================");
                println!("Topics tracked:       {}", state.knowledge_states.len());
                println!(
                    "Overall mastery:      {}% ({})",
                    overall.score,
                    overall.level.label()
                );
                println!("Diagnostics taken:    {}", diagnostics);
                println!("Cards:                {}", cards.total);
                println!("Cards due today:      {}", cards.due_today);
                println!("Cards mastered:       {}", cards.mastered);
                if !weak.is_empty() {
                    println!("\nNeeds work:");
                    for k in weak {
                        println!("  {:<30} {}%", truncate(&k.topic_id, 28), k.score);
                    }
                }
            }
        }

        Commands::Export { output } => {
            let json = db.load_snapshot()?.to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    if cli.json {
                        print_json(path.display().to_string())?;
                    } else {
                        println!("Exported to {}", path.display());
                    }
                }
                None => println!("{}", json),
            }
        }

        Commands::Import { file } => {
            let state = LearnerState::from_json(&std::fs::read_to_string(&file)?)?;
            db.save_snapshot(&state)?;
            if cli.json {
                print_json(serde_json::json!({
                    "topics": state.knowledge_states.len(),
                    "cards": state.flashcard_progress.len(),
                }))?;
            } else {
                println!(
                    "Imported {} topics and {} cards",
                    state.knowledge_states.len(),
                    state.flashcard_progress.len()
                );
            }
        }

        Commands::Tui => {
            tui::run(db)?;
        }
    }

    Ok(())
}

fn print_knowledge(k: &KnowledgeState) {
    println!("Topic: {}", k.topic_id);
    println!("Score: {}%", k.score);
    println!("Level: {}", k.mastery_level.label());
    println!("Answers: {}/{} correct", k.correct_answers, k.total_answers);
    println!("Attempts: {}", k.attempts);
    if let Some(at) = k.last_attempt_at {
        println!("Last attempt: {}", at.format("%Y-%m-%d %H:%M"));
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
