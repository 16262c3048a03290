use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::Cli;
use cli::commands::{Commands, EpisodeCommands, ScheduleCommands, SeriesCommands};
use unlockr::access::{AccessApplier, StepStatus};
use unlockr::catalog::{EpisodeCatalog, SyncStatus, sync_episode_numbers};
use unlockr::config::Config;
use unlockr::daemon::UnlockDaemon;
use unlockr::domain::{AccessTier, Confidence, Intent, UnlockSchedule};
use unlockr::interpret::{CommandExecutor, CommandOutcome, CommandStatus, GeminiInterpreter, IntentExecutor};
use unlockr::platform::PatreonClient;
use unlockr::schedule::{RowStatus, RunOptions, RunReport, ScheduleAdmin, ScheduleRunner, local_now, next_trigger};
use unlockr::storage::{ContentStore, ScheduleStore, SqliteStore};

const DATE_FORMAT: &str = "%b %-d, %Y %H:%M";

fn setup_logging(level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("unlockr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("unlockr.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.unwrap_or("info")))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Long-lived collaborators built from the config
struct App {
    config: Config,
    store: SqliteStore,
    platform: PatreonClient,
}

impl App {
    fn open(config: Config) -> Result<Self> {
        let store = SqliteStore::open(&config.database.path)
            .context(format!("Failed to open database {}", config.database.path.display()))?
            .with_custom_fields(config.fields.custom_fields_enabled);
        let platform = PatreonClient::new(&config.patreon, config.settings.patreon_access_token())
            .context("Failed to create Patreon client")?;
        Ok(Self {
            config,
            store,
            platform,
        })
    }

    fn catalog(&self) -> EpisodeCatalog<'_> {
        EpisodeCatalog::new(&self.store, &self.config.fields)
    }

    fn applier(&self) -> AccessApplier<'_> {
        AccessApplier::new(
            &self.store,
            &self.platform,
            &self.config.fields,
            self.config.settings.paid_tier_id(),
        )
    }

    fn schedule_admin(&self) -> ScheduleAdmin<'_> {
        ScheduleAdmin::new(&self.store, &self.store, &self.config.daemon)
    }

    fn runner(&self) -> ScheduleRunner<'_> {
        ScheduleRunner::new(&self.store, &self.store, &self.platform, &self.config)
    }
}

async fn run_application(cli: &Cli, app: &App) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run { preview, force } => handle_run_command(app, *preview, *force).await,
        Commands::Command { text } => handle_command(app, &text.join(" ")).await,
        Commands::Set { episode, access } => handle_set_command(app, *episode, *access).await,
        Commands::Status => handle_status_command(app),
        Commands::Schedules { command } => handle_schedules_command(app, command),
        Commands::SyncEpisodes { apply } => handle_sync_command(app, *apply),
        Commands::Series { command } => handle_series_command(app, command),
        Commands::Episode { command } => handle_episode_command(app, command),
        Commands::Daemon => handle_daemon_command(app).await,
    }
}

async fn handle_run_command(app: &App, preview: bool, force: bool) -> Result<()> {
    let options = RunOptions { preview, force };
    info!("Running schedules: {:?}", options);

    if preview {
        println!("{}", "Testing auto-unlock (preview mode)".cyan());
    }
    if force {
        println!(
            "{} Ignoring schedule times and unlocking all due episodes now.",
            "Force mode:".yellow().bold()
        );
    }

    let report = app.runner().run(local_now(), options).await.context("Schedule run failed")?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    if report.rows.is_empty() {
        println!("{}", report.summary().yellow());
        return;
    }

    for row in &report.rows {
        let due = row
            .due_at
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| "-".to_string());
        let episode = row
            .episode
            .as_ref()
            .map(|e| e.label())
            .unwrap_or_else(|| "-".to_string());

        let status = match row.status {
            RowStatus::Unlocked => {
                let next = row
                    .next_due_at
                    .map(|d| d.format(DATE_FORMAT).to_string())
                    .unwrap_or_default();
                format!("Unlocked! Next: {}", next).green().bold()
            }
            RowStatus::WillUnlock => "Will unlock".blue(),
            RowStatus::NotDue => format!("Next unlock in {}", row.detail.as_deref().unwrap_or("?")).normal(),
            RowStatus::NoEpisodeFound => "No episodes to unlock".yellow(),
            RowStatus::Disabled => "Disabled".dimmed(),
            RowStatus::SeriesMissing | RowStatus::UnlockFailed => {
                format!("{}: {}", row.status, row.detail.as_deref().unwrap_or("")).red()
            }
        };

        println!("{}", row.series_name.bold());
        println!("  Schedule: {}", row.recurrence);
        println!("  Next due: {}", due);
        println!("  Episode:  {}", episode);
        println!("  Status:   {}", status);

        if let Some(outcome) = &row.access {
            for problem in outcome.problems() {
                println!("    {} {}: {}", "!".yellow(), problem.step, problem.status.detail());
            }
        }
    }

    let summary = report.summary();
    if report.unlock_count() > 0 {
        println!("\n{}", summary.green());
    } else {
        println!("\n{}", summary);
    }
}

async fn handle_command(app: &App, text: &str) -> Result<()> {
    info!("Processing command: {}", text);
    println!("{} {}", "Processing:".cyan(), text);

    let interpreter = GeminiInterpreter::new(&app.config.gemini, app.config.settings.gemini_api_key())
        .context("Failed to create Gemini client")?;
    let executor = CommandExecutor::new(&interpreter, app.catalog(), app.applier());

    let outcome = executor.execute(text).await.context("Command failed")?;
    print_command_outcome(app, &outcome);
    Ok(())
}

async fn handle_set_command(app: &App, episode: i64, access: AccessTier) -> Result<()> {
    let executor = IntentExecutor::new(app.catalog(), app.applier());

    let intent = Intent {
        episode_number: episode,
        access_type: access,
        confidence: Confidence::High,
    };
    let outcome = executor.execute(&intent).await.context("Command failed")?;
    print_command_outcome(app, &outcome);
    Ok(())
}

fn print_command_outcome(app: &App, outcome: &CommandOutcome) {
    if let Some(interpretation) = &outcome.interpretation {
        println!("{}", "Gemini interpretation:".bold());
        println!("{}", interpretation.raw_text);
    }

    if !outcome.near_matches.is_empty() {
        println!("{}", "Episodes mentioning this number:".bold());
        for m in &outcome.near_matches {
            println!(
                "  {} (ID: {}, {}: {})",
                m.title,
                m.id,
                app.config.fields.episode_number,
                m.episode_number.as_deref().unwrap_or("")
            );
        }
    }

    if let Some(episode) = &outcome.episode {
        println!("{} {}", "Found episode:".bold(), episode.label());
        let terms: Vec<String> = outcome
            .current_terms
            .iter()
            .map(|t| format!("{} (ID: {})", t.name, t.id))
            .collect();
        if terms.is_empty() {
            println!("  Current terms: None");
        } else {
            println!("  Current terms: {}", terms.join(", "));
        }
        println!("  Current access: {}", episode.access);
    }

    if let Some(access) = &outcome.access {
        for report in &access.steps {
            let line = format!("  [{}] {}", report.step, report.status.detail());
            match report.status {
                StepStatus::Applied(_) => println!("{}", line.green()),
                StepStatus::Skipped(_) => println!("{}", line.yellow()),
                StepStatus::Failed(_) => println!("{}", line.red()),
            }
        }
    }

    match outcome.status {
        CommandStatus::Updated => println!("{}", outcome.message.green().bold()),
        _ => println!("{}", outcome.message.red().bold()),
    }
}

fn handle_status_command(app: &App) -> Result<()> {
    println!("{}", "Quick status".bold());
    for (name, set) in app.config.settings.status() {
        let mark = if set { "set".green() } else { "not set".red() };
        println!("  {:<24} {}", name, mark);
    }

    let fields = &app.config.fields;
    println!("{}", "Fields".bold());
    println!("  Episode number:   {}", fields.episode_number);
    println!("  Patreon post id:  {}", fields.external_post_id);
    println!("  Access field:     {}", fields.access_custom_field);
    println!("  Taxonomy:         {}", fields.taxonomy);

    let schedules = app.store.load_schedules().context("Failed to load schedules")?;
    let enabled = schedules.iter().filter(|s| s.enabled).count();
    println!("{}", "Schedules".bold());
    println!("  {} configured, {} enabled", schedules.len(), enabled);
    match next_trigger(&schedules, local_now()) {
        Some(at) => println!("  Next scheduled run: {}", at.format(DATE_FORMAT)),
        None => println!("  Next scheduled run: none"),
    }
    Ok(())
}

fn handle_schedules_command(app: &App, command: &ScheduleCommands) -> Result<()> {
    info!("Handling schedules command: {:?}", command);
    match command {
        ScheduleCommands::List => {
            let schedules = app.store.load_schedules().context("Failed to load schedules")?;
            if schedules.is_empty() {
                println!("{}", "No unlock schedules configured.".yellow());
            }
            for (index, schedule) in schedules.iter().enumerate() {
                let state = if schedule.enabled { "enabled".green() } else { "disabled".dimmed() };
                let due = schedule
                    .next_due_at
                    .map(|d| d.format(DATE_FORMAT).to_string())
                    .unwrap_or_else(|| "not set".to_string());
                println!(
                    "{:>3}. {} (series {}) [{}]",
                    index + 1,
                    schedule.series_name.bold(),
                    schedule.series_id,
                    state
                );
                println!("     {}", schedule.describe());
                if let Some(term) = &schedule.search_term {
                    println!("     Search term: {}", term);
                }
                println!("     Next due: {}", due);
            }
        }
        ScheduleCommands::Add {
            series_id,
            every,
            at,
            include_weekends,
            search_term,
        } => {
            let schedule = UnlockSchedule::new(*series_id, "")
                .with_interval(*every)
                .with_anchor(*at)
                .with_skip_weekends(!include_weekends)
                .with_search_term(search_term.clone());
            let position = app.schedule_admin().add(local_now(), schedule).context("Failed to add schedule")?;
            println!("{} schedule #{}", "Added".green(), position);
        }
        ScheduleCommands::Remove { position } => {
            let removed = app.schedule_admin().remove(local_now(), *position).context("Failed to remove schedule")?;
            println!("{} schedule for {}", "Removed".green(), removed.series_name);
        }
        ScheduleCommands::Enable { position } => {
            app.schedule_admin().set_enabled(local_now(), *position, true).context("Failed to enable schedule")?;
            println!("{} schedule #{}", "Enabled".green(), position);
        }
        ScheduleCommands::Disable { position } => {
            app.schedule_admin().set_enabled(local_now(), *position, false).context("Failed to disable schedule")?;
            println!("{} schedule #{}", "Disabled".green(), position);
        }
        ScheduleCommands::Reset => {
            let cleared = app.schedule_admin().reset_due_dates(local_now()).context("Failed to reset dates")?;
            println!("{} {} unlock date(s) have been reset", "Done:".green(), cleared);
        }
    }
    Ok(())
}

fn handle_sync_command(app: &App, apply: bool) -> Result<()> {
    let report = sync_episode_numbers(&app.catalog(), apply).context("Episode sync failed")?;
    for row in &report.rows {
        let tag = match row.status {
            SyncStatus::AlreadySet => row.status.tag().dimmed(),
            SyncStatus::WillUpdate | SyncStatus::Updated => row.status.tag().green(),
            SyncStatus::NoNumberFound => row.status.tag().yellow(),
        };
        let current = row.current.as_deref().unwrap_or("-");
        let detected = row.detected.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
        println!("{:>6}  {:<60} {:>6} {:>6}  {}", row.episode_id, row.title, current, detected, tag);
    }

    let pending = report.count(SyncStatus::WillUpdate);
    let updated = report.count(SyncStatus::Updated);
    if apply {
        println!("\n{} {} episode(s) updated", "Done:".green(), updated);
    } else {
        println!("\n{} episode(s) will be updated; rerun with --apply to save", pending);
    }
    Ok(())
}

fn handle_series_command(app: &App, command: &SeriesCommands) -> Result<()> {
    match command {
        SeriesCommands::Add { title } => {
            let id = app.store.insert_series(title).context("Failed to add series")?;
            println!("{} series {} (ID: {})", "Added".green(), title, id);
        }
        SeriesCommands::List => {
            for series in app.store.list_series().context("Failed to list series")? {
                println!("{:>6}  {}", series.id, series.title);
            }
        }
    }
    Ok(())
}

fn handle_episode_command(app: &App, command: &EpisodeCommands) -> Result<()> {
    let fields = &app.config.fields;
    match command {
        EpisodeCommands::Add {
            title,
            number,
            access,
            post_id,
            content,
        } => {
            let id = app.store.insert_episode(title, content).context("Failed to add episode")?;
            if let Some(number) = number {
                app.store
                    .set_meta(id, &fields.episode_number, &number.to_string())
                    .context("Failed to set episode number")?;
            }
            if let Some(post_id) = post_id {
                app.store
                    .set_meta(id, &fields.external_post_id, post_id)
                    .context("Failed to set post id")?;
            }
            if let Some(access) = access {
                app.catalog().classify(id, *access).context("Failed to classify episode")?;
            }
            println!("{} episode {} (ID: {})", "Added".green(), title, id);
        }
        EpisodeCommands::List { advance } => {
            let catalog = app.catalog();
            let episodes = if *advance {
                catalog.advance_episodes().context("Failed to list episodes")?
            } else {
                let mut episodes = Vec::new();
                for record in app.store.list_episodes().context("Failed to list episodes")? {
                    episodes.push(catalog.assemble(&record).context("Failed to load episode")?);
                }
                episodes
            };
            for episode in episodes {
                let number = episode.episode_number.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>6}  #{:<5} {:<8} {}",
                    episode.id,
                    number,
                    episode.access.to_string(),
                    episode.title
                );
            }
        }
    }
    Ok(())
}

async fn handle_daemon_command(app: &App) -> Result<()> {
    println!("{}", "Starting unlock daemon in foreground (Ctrl-C to stop)...".cyan());
    let mut daemon = UnlockDaemon::new(app.runner(), &app.store, &app.config.daemon);
    daemon
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("Daemon failed")?;

    let state = daemon.state();
    println!(
        "Daemon stopped: {} run(s), {} unlock(s), {} busy skip(s)",
        state.fires, state.total_unlocked, state.busy_skips
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    let app = App::open(config)?;

    // Run the main application logic
    run_application(&cli, &app).await.context("Application failed")?;

    Ok(())
}
