//! Quizforge - AI-powered quiz generation and timed study sessions
//!
//! Local-first: everything lives in a per-user data directory, nothing
//! leaves the machine except the generation API call.

use std::io::{BufRead, Write as _};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::auth::{password_strength, AuthService};
use crate::backup::{spawn_auto_backup, BackupManager};
use crate::config::Config;
use crate::errors::QuizforgeError;
use crate::gamification::GamificationService;
use crate::generate::{GeminiGenerator, GenerationService};
use crate::model::{
    BackupKind, Complexity, Difficulty, EndReason, ExportBundle, FocusArea, GenerationSettings,
    Question, QuestionBody, QuestionKind, StudyConfig, StudyMode, UserAnswer,
};
use crate::repo::{PreferencesRepo, QuestionRepo, UserRepo};
use crate::store::keys::{session_event, SessionEvent};
use crate::store::Store;
use crate::study::StudyService;
use crate::transfer::{format_bytes, TransferService};

#[derive(Parser)]
#[command(name = "quizforge")]
#[command(about = "Generate quiz questions from study material and drill them in timed sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new account and log in
    Register {
        name: String,
        email: String,
    },
    /// Log in with an existing account
    Login {
        email: String,
    },
    /// Log out the current user
    Logout,
    /// Show the logged-in user and their stats
    Whoami,
    /// Generate quiz questions from a file or pasted text
    Generate {
        /// Read study material from this file
        #[arg(long, value_name = "FILE", conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Study material given inline
        #[arg(long)]
        text: Option<String>,
        /// Number of questions to generate
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
        #[arg(short, long, value_enum, default_value = "medium")]
        difficulty: Difficulty,
        /// Question type to generate
        #[arg(short = 't', long = "type", value_enum, default_value = "multiple-choice")]
        kind: QuestionKind,
        #[arg(long, value_enum, default_value = "general")]
        focus: FocusArea,
        /// Alternatives per multiple-choice question
        #[arg(long, default_value_t = 4)]
        alternatives: usize,
        #[arg(long, value_enum, default_value = "standard")]
        complexity: Complexity,
        /// Anchor questions in the concrete context of the material
        #[arg(long)]
        contextual: bool,
    },
    /// Run an interactive timed study session
    Study {
        /// Session length in minutes
        #[arg(short, long, default_value_t = 30)]
        minutes: u64,
        /// Questions to draw
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
        /// Restrict to one difficulty
        #[arg(short, long, value_enum)]
        difficulty: Option<Difficulty>,
        #[arg(long, value_enum, default_value = "practice")]
        mode: StudyMode,
    },
    /// List stored questions
    Questions {
        /// Only show favorites
        #[arg(long)]
        favorites: bool,
    },
    /// Toggle a question as favorite
    Favorite {
        question_id: String,
    },
    /// Manage backups
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
    /// Export all data to a JSON file
    Export {
        output: PathBuf,
    },
    /// Import data from a previously exported JSON file
    Import {
        input: PathBuf,
    },
    /// Show storage statistics
    Stats,
    /// Delete all stored data (a final backup is kept)
    ClearData {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Delete the logged-in account and all its data
    DeleteAccount {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// List backups, oldest first
    List,
    /// Create a manual backup now
    Create,
    /// Restore a backup by id
    Restore { id: String },
}

/// Everything a command handler needs.
struct App {
    store: Store,
    config: Config,
    auth: AuthService,
}

impl App {
    fn open(config: Config) -> Result<Self> {
        let store = Store::open(&config.data_dir, config.quota_bytes)
            .map_err(QuizforgeError::Storage)?;
        let auth = AuthService::new(store.clone());
        Ok(Self {
            store,
            config,
            auth,
        })
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = Config::load(cli.config.as_deref())?;
    let app = App::open(config)?;

    match cli.command {
        Commands::Register { name, email } => register(&app, &name, &email),
        Commands::Login { email } => login(&app, &email),
        Commands::Logout => {
            app.auth.logout()?;
            println!("{}", "Logged out.".green());
            Ok(())
        }
        Commands::Whoami => whoami(&app),
        Commands::Generate {
            file,
            text,
            count,
            difficulty,
            kind,
            focus,
            alternatives,
            complexity,
            contextual,
        } => {
            let settings = GenerationSettings {
                count,
                difficulty,
                kind,
                focus,
                alternatives,
                complexity,
                contextual,
            };
            generate(&app, file, text, settings).await
        }
        Commands::Study {
            minutes,
            count,
            difficulty,
            mode,
        } => {
            let config = StudyConfig {
                duration_minutes: minutes,
                question_count: count,
                difficulty,
                mode,
            };
            study(&app, config).await
        }
        Commands::Questions { favorites } => list_questions(&app, favorites),
        Commands::Favorite { question_id } => favorite(&app, &question_id),
        Commands::Backup { command } => backup(&app, command),
        Commands::Export { output } => export(&app, &output),
        Commands::Import { input } => import(&app, &input),
        Commands::Stats => stats(&app),
        Commands::ClearData { yes } => clear_data(&app, yes),
        Commands::DeleteAccount { yes } => delete_account(&app, yes),
    }
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

fn register(app: &App, name: &str, email: &str) -> Result<()> {
    let password = prompt_line("Password")?;
    println!("Password strength: {}", password_strength(&password));
    let confirm = prompt_line("Confirm password")?;

    let user = app.auth.register(name, email, &password, &confirm)?;
    println!(
        "{} Welcome, {}! You are now logged in.",
        "✓".green(),
        user.name.bold()
    );
    Ok(())
}

fn login(app: &App, email: &str) -> Result<()> {
    let password = prompt_line("Password")?;
    let user = app.auth.login(email, &password)?;
    println!("{} Welcome back, {}.", "✓".green(), user.name.bold());
    Ok(())
}

fn whoami(app: &App) -> Result<()> {
    let user = app.auth.require_user()?;
    println!("{} <{}>", user.name.bold(), user.email);
    println!(
        "  generated {} · answered {} · accuracy {}% · {} sessions",
        user.stats.questions_generated,
        user.stats.questions_answered,
        user.stats.accuracy,
        user.stats.study_sessions
    );
    Ok(())
}

async fn generate(
    app: &App,
    file: Option<PathBuf>,
    text: Option<String>,
    settings: GenerationSettings,
) -> Result<()> {
    let user = app.auth.require_user()?;
    let ctx = app.auth.context()?;

    let (content, source) = match (file, text) {
        (Some(path), _) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            (content, source)
        }
        (None, Some(text)) => (text, "pasted text".to_string()),
        (None, None) => anyhow::bail!("provide study material with --file or --text"),
    };

    let api_key = app
        .config
        .generator
        .api_key
        .clone()
        .ok_or_else(|| QuizforgeError::Config("no generation API key configured".to_string()))?;
    let generator = GeminiGenerator::new(
        &app.config.generator.endpoint,
        &app.config.generator.model,
        api_key,
    )
    .with_source_label(&source);

    println!(
        "Generating {} {} questions from {}...",
        settings.count,
        settings.difficulty,
        source.bold()
    );
    let service = GenerationService::new(app.store.clone(), Box::new(generator));
    let questions = service
        .generate_and_save(&ctx, &content, &source, &settings)
        .await?;

    println!(
        "{} Generated {} questions for {}.",
        "✓".green(),
        questions.len().to_string().bold(),
        user.name
    );
    for q in &questions {
        println!("  [{}] {}", q.body.kind_name().dimmed(), q.question);
    }
    Ok(())
}

async fn study(app: &App, config: StudyConfig) -> Result<()> {
    let user = app.auth.require_user()?;
    let ctx = app.auth.context()?;

    let study = StudyService::new(app.store.clone());
    let gamification = GamificationService::new(app.store.clone());
    let mut session = study.start(&ctx, config)?;

    for achievement in gamification.record_daily_activity(&ctx)? {
        announce_achievement(achievement);
    }

    // Keep auto-backups running for the duration of the session.
    let backups = BackupManager::new(app.store.clone());
    let auto_backup = spawn_auto_backup(
        backups,
        UserRepo::new(app.store.clone()),
        Duration::from_secs(app.config.auto_backup_minutes * 60),
    );
    let mut events = app.store.subscribe();

    println!(
        "Study session: {} questions, {} minutes, {} mode. Good luck, {}!",
        session.total_questions(),
        session.config().duration_minutes,
        session.config().mode,
        user.name.bold()
    );
    println!("{}", "Answer, or: [s]kip  [p]ause  [q]uit".dimmed());

    let reason = loop {
        if session.expired() {
            println!("{}", "Time is up!".yellow().bold());
            break EndReason::TimeExpired;
        }
        if session.is_complete() {
            break EndReason::Completed;
        }
        // Another process logged this user out; stop without saving more.
        if external_logout(&mut events) {
            println!("{}", "Logged out elsewhere, ending session.".yellow());
            break EndReason::Completed;
        }

        let position = session.position();
        let total = session.total_questions();
        let question = match session.current_question() {
            Some(q) => q.clone(),
            None => break EndReason::Completed,
        };
        print_question(&question, position, total, session.remaining());

        let input = prompt_line(">")?;
        match input.trim().to_lowercase().as_str() {
            "q" | "quit" => break EndReason::Completed,
            "p" | "pause" => {
                session.pause()?;
                println!("{}", "Paused. Press Enter to resume.".dimmed());
                let _ = prompt_line("")?;
                session.resume()?;
                continue;
            }
            "s" | "skip" => {
                study.skip(&mut session)?;
                println!("{}", "Skipped.".dimmed());
                continue;
            }
            raw => {
                let Some(answer) = parse_answer(&question.body, raw) else {
                    println!("{}", "Did not understand that answer, try again.".red());
                    continue;
                };
                let record = study.submit_answer(&ctx, &mut session, answer)?;
                if record.correct {
                    println!("{}", "Correct!".green().bold());
                } else {
                    println!("{}", "Incorrect.".red().bold());
                    print_correct_answer(&question);
                }
                if !question.explanation.is_empty() {
                    println!("  {}", question.explanation.dimmed());
                }
                for achievement in gamification.record_answer(
                    &ctx,
                    record.correct,
                    question.difficulty,
                    record.time_spent,
                )? {
                    announce_achievement(achievement);
                }
            }
        }
    };

    auto_backup.abort();
    let record = study.finish(&ctx, session, reason)?;
    for achievement in gamification.record_session(&ctx, &record.stats)? {
        announce_achievement(achievement);
    }

    println!();
    println!("{}", "Session results".bold().underline());
    println!(
        "  {} answered, {} correct, {} skipped",
        record.stats.total_questions,
        record.stats.correct_answers.to_string().green(),
        record.stats.skipped_questions
    );
    println!(
        "  accuracy {}% · {}s total · {}s per question",
        record.stats.accuracy.to_string().bold(),
        record.stats.total_time,
        record.stats.average_time_per_question
    );
    Ok(())
}

fn external_logout(events: &mut tokio::sync::broadcast::Receiver<crate::store::StoreEvent>) -> bool {
    while let Ok(event) = events.try_recv() {
        if session_event(&event) == Some(SessionEvent::ExternalLogout) {
            return true;
        }
    }
    false
}

fn print_question(question: &Question, position: usize, total: usize, remaining: Duration) {
    let mins = remaining.as_secs() / 60;
    let secs = remaining.as_secs() % 60;
    println!();
    println!(
        "{} {}",
        format!("[{}/{}]", position + 1, total).dimmed(),
        format!("{}:{:02} left", mins, secs).dimmed()
    );
    println!("{}", question.question.bold());
    match &question.body {
        QuestionBody::MultipleChoice { options, .. } => {
            for (i, option) in options.iter().enumerate() {
                println!("  {}. {}", i + 1, option);
            }
            println!("{}", "Answer with the option number.".dimmed());
        }
        QuestionBody::TrueFalse { .. } => {
            println!("{}", "Answer true or false.".dimmed());
        }
        QuestionBody::Essay => {
            println!("{}", "Write a short answer.".dimmed());
        }
    }
}

fn print_correct_answer(question: &Question) {
    match &question.body {
        QuestionBody::MultipleChoice {
            options,
            correct_index,
        } => {
            if let Some(correct) = options.get(*correct_index) {
                println!("  The correct answer was: {}", correct.green());
            }
        }
        QuestionBody::TrueFalse { answer } => {
            println!("  The correct answer was: {}", answer.to_string().green());
        }
        QuestionBody::Essay => {}
    }
}

/// Interpret raw input against the question type. Multiple-choice input is
/// 1-based on screen, 0-based in storage.
fn parse_answer(body: &QuestionBody, raw: &str) -> Option<UserAnswer> {
    match body {
        QuestionBody::MultipleChoice { options, .. } => {
            let picked: usize = raw.trim().parse().ok()?;
            if picked == 0 || picked > options.len() {
                return None;
            }
            Some(UserAnswer::Choice(picked - 1))
        }
        QuestionBody::TrueFalse { .. } => match raw.trim().to_lowercase().as_str() {
            "t" | "true" | "y" | "yes" => Some(UserAnswer::Bool(true)),
            "f" | "false" | "n" | "no" => Some(UserAnswer::Bool(false)),
            _ => None,
        },
        QuestionBody::Essay => Some(UserAnswer::Text(raw.to_string())),
    }
}

fn announce_achievement(achievement: &crate::gamification::Achievement) {
    println!(
        "{} {} — {} (+{} points)",
        "★".yellow(),
        achievement.name.yellow().bold(),
        achievement.description,
        achievement.points
    );
}

fn list_questions(app: &App, favorites_only: bool) -> Result<()> {
    let ctx = app.auth.context()?;
    let questions = QuestionRepo::new(app.store.clone()).get_all(&ctx)?;
    if questions.is_empty() {
        println!("No questions stored. Run {} first.", "quizforge generate".bold());
        return Ok(());
    }

    let favorites = PreferencesRepo::new(app.store.clone()).favorites(&ctx)?;
    for q in &questions {
        let is_favorite = favorites.contains(&q.id);
        if favorites_only && !is_favorite {
            continue;
        }
        let marker = if is_favorite { "★".yellow() } else { " ".normal() };
        let state = if q.state.answered {
            match q.state.correct {
                Some(true) => "correct".green(),
                _ => "incorrect".red(),
            }
        } else {
            "unanswered".dimmed()
        };
        println!(
            "{} {} [{}|{}|{}] {}",
            marker,
            q.id.dimmed(),
            q.body.kind_name(),
            q.difficulty,
            state,
            q.question
        );
    }
    Ok(())
}

fn favorite(app: &App, question_id: &str) -> Result<()> {
    let ctx = app.auth.context()?;
    let questions = QuestionRepo::new(app.store.clone());
    if questions.get_by_id(&ctx, question_id)?.is_none() {
        anyhow::bail!("no question with id {}", question_id);
    }
    let now_favorite =
        PreferencesRepo::new(app.store.clone()).toggle_favorite(&ctx, question_id)?;
    if now_favorite {
        println!("{} Added to favorites.", "★".yellow());
    } else {
        println!("Removed from favorites.");
    }
    Ok(())
}

fn backup(app: &App, command: BackupCommands) -> Result<()> {
    let ctx = app.auth.context()?;
    let manager = BackupManager::new(app.store.clone());
    match command {
        BackupCommands::List => {
            let ledger = manager.list()?;
            if ledger.is_empty() {
                println!("No backups yet.");
                return Ok(());
            }
            for b in ledger {
                println!(
                    "{}  {}  {}  {} users, {} questions",
                    b.id.dimmed(),
                    b.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    b.kind,
                    b.data.users.len(),
                    b.data.questions.len()
                );
            }
        }
        BackupCommands::Create => {
            let backup = manager.create(&ctx, BackupKind::Manual)?;
            println!("{} Created backup {}.", "✓".green(), backup.id.bold());
        }
        BackupCommands::Restore { id } => {
            let backup = manager.restore(&ctx, &id)?;
            println!(
                "{} Restored backup from {}.",
                "✓".green(),
                backup.timestamp.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }
    Ok(())
}

fn export(app: &App, output: &std::path::Path) -> Result<()> {
    let ctx = app.auth.context()?;
    let bundle = TransferService::new(app.store.clone()).export(&ctx)?;
    let json = serde_json::to_string_pretty(&bundle)?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("{} Exported data to {}.", "✓".green(), output.display());
    Ok(())
}

fn import(app: &App, input: &std::path::Path) -> Result<()> {
    let ctx = app.auth.context()?;
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let bundle: ExportBundle = serde_json::from_str(&content)
        .map_err(|e| QuizforgeError::Import(crate::errors::ImportError::InvalidFormat(
            e.to_string(),
        )))?;
    TransferService::new(app.store.clone()).import(&ctx, &bundle)?;
    println!("{} Imported data (a pre-import backup was taken).", "✓".green());
    Ok(())
}

fn stats(app: &App) -> Result<()> {
    let ctx = app.auth.context()?;
    let report = TransferService::new(app.store.clone()).report(&ctx)?;
    println!("{}", "Storage".bold().underline());
    println!("  users      {}", report.users);
    println!("  questions  {}", report.questions);
    println!("  sessions   {}", report.sessions);
    println!("  backups    {}", report.backups);
    println!("  size       {}", format_bytes(report.total_bytes));
    if let Some(quota) = app.config.quota_bytes {
        println!("  quota      {}", format_bytes(quota));
    }
    match report.last_backup {
        Some(at) => println!("  last backup {}", at.format("%Y-%m-%d %H:%M:%S")),
        None => println!("  last backup never"),
    }
    Ok(())
}

fn clear_data(app: &App, yes: bool) -> Result<()> {
    if !yes {
        let answer = prompt_line("This deletes ALL stored data. Type 'yes' to confirm")?;
        if answer.trim().to_lowercase() != "yes" {
            println!("Aborted.");
            return Ok(());
        }
    }
    let ctx = app.auth.context()?;
    TransferService::new(app.store.clone()).clear_all(&ctx)?;
    println!(
        "{} All data cleared. A final backup was kept and can be restored.",
        "✓".green()
    );
    Ok(())
}

fn delete_account(app: &App, yes: bool) -> Result<()> {
    let user = app.auth.require_user()?;
    if !yes {
        let answer = prompt_line(&format!(
            "This permanently deletes {} and all their data. Type 'yes' to confirm",
            user.email
        ))?;
        if answer.trim().to_lowercase() != "yes" {
            println!("Aborted.");
            return Ok(());
        }
    }
    TransferService::new(app.store.clone()).clear_user_data(&user.id)?;
    println!("{} Account {} deleted.", "✓".green(), user.email);
    Ok(())
}
