use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nota::auth::{NewUser, UserRegistry};
use nota::{
    AppConfig, Database, NoteId, NoteMetaPatch, NoteService, ServiceError, SortMode, UserId,
    VersionId,
};
use time::format_description;

/// nota - personal notes with autosave, history, and sharing
#[derive(Parser)]
#[command(name = "nota")]
#[command(about = "A personal note-taking tool with version history and public sharing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Register a new account
    Register(RegisterCommand),
    /// Verify a username/password pair
    Login(LoginCommand),
    /// Reset a password using the account's security answer
    ResetPassword(ResetPasswordCommand),
    /// List notes, optionally filtered and sorted
    List(ListCommand),
    /// Create a new note
    Create(CreateCommand),
    /// Update a note's content (versioning the previous content)
    Update(UpdateCommand),
    /// Patch a note's title, tags, or pin flag
    Meta(MetaCommand),
    /// Delete a note and its history
    Delete(DeleteCommand),
    /// Enable public sharing for a note
    Share(NoteRefCommand),
    /// Disable public sharing for a note
    Unshare(NoteRefCommand),
    /// Show a note's version history
    History(NoteRefCommand),
    /// Restore a note to an earlier version
    Restore(RestoreCommand),
    /// Export all notes as JSON
    Export(ExportCommand),
    /// Import notes from a JSON export
    Import(ImportCommand),
    /// Read a publicly shared note by its token
    ShowPublic(ShowPublicCommand),
    /// Open the interactive TUI
    Tui(UserCommand),
}

#[derive(Parser)]
struct RegisterCommand {
    #[arg(short, long)]
    username: String,
    #[arg(short, long)]
    password: String,
    #[arg(long, value_name = "QUESTION")]
    security_question: String,
    #[arg(long, value_name = "ANSWER")]
    security_answer: String,
}

#[derive(Parser)]
struct LoginCommand {
    #[arg(short, long)]
    username: String,
    #[arg(short, long)]
    password: String,
}

#[derive(Parser)]
struct ResetPasswordCommand {
    #[arg(short, long)]
    username: String,
    #[arg(long, value_name = "ANSWER")]
    security_answer: String,
    #[arg(long)]
    new_password: String,
}

#[derive(Parser)]
struct UserCommand {
    /// Acting user (a registered username)
    #[arg(short, long)]
    user: String,
}

#[derive(Parser)]
struct ListCommand {
    #[arg(short, long)]
    user: String,
    /// Case-insensitive search across title, tags, and content
    #[arg(short, long)]
    search: Option<String>,
    /// Sort mode: updated (default), created, or title
    #[arg(long, value_name = "MODE")]
    sort: Option<String>,
}

#[derive(Parser)]
struct CreateCommand {
    #[arg(short, long)]
    user: String,
    #[arg(short, long)]
    title: Option<String>,
    #[arg(short, long, default_value = "")]
    content: String,
    /// Comma-separated free-text tags
    #[arg(long)]
    tags: Option<String>,
}

#[derive(Parser)]
struct UpdateCommand {
    #[arg(short, long)]
    user: String,
    #[arg(short, long, value_name = "ID")]
    note: i64,
    #[arg(short, long)]
    content: String,
    #[arg(short, long)]
    title: Option<String>,
}

#[derive(Parser)]
struct MetaCommand {
    #[arg(short, long)]
    user: String,
    #[arg(short, long, value_name = "ID")]
    note: i64,
    #[arg(short, long)]
    title: Option<String>,
    /// New tags; use --clear-tags to remove them instead
    #[arg(long, conflicts_with = "clear_tags")]
    tags: Option<String>,
    #[arg(long)]
    clear_tags: bool,
    #[arg(long, conflicts_with = "unpin")]
    pin: bool,
    #[arg(long)]
    unpin: bool,
}

#[derive(Parser)]
struct DeleteCommand {
    #[arg(short, long)]
    user: String,
    #[arg(short, long, value_name = "ID")]
    note: i64,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

#[derive(Parser)]
struct NoteRefCommand {
    #[arg(short, long)]
    user: String,
    #[arg(short, long, value_name = "ID")]
    note: i64,
}

#[derive(Parser)]
struct RestoreCommand {
    #[arg(short, long)]
    user: String,
    #[arg(short, long, value_name = "ID")]
    note: i64,
    #[arg(short, long, value_name = "ID")]
    version: i64,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

#[derive(Parser)]
struct ExportCommand {
    #[arg(short, long)]
    user: String,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct ImportCommand {
    #[arg(short, long)]
    user: String,
    /// JSON file produced by `nota export`
    #[arg(short, long)]
    file: PathBuf,
}

#[derive(Parser)]
struct ShowPublicCommand {
    /// The note's public share token
    #[arg(short, long)]
    token: String,
}

fn main() {
    // .env overrides are optional; absence is not an error
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e}");
        std::process::exit(exit_code);
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors (bad input, missing notes, conflicts) exit with code 1;
/// internal errors (storage, I/O) exit with code 2.
fn is_user_error(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ServiceError>()
        .is_some_and(ServiceError::is_user_error)
}

fn run(cli: &Cli) -> Result<()> {
    let config = AppConfig::from_env()?;
    nota::utils::ensure_database_directory(&config.db_path)?;
    let db = Database::open(&config.db_path).context("Failed to open database")?;
    let service = NoteService::with_max_versions(db, config.max_versions);

    match &cli.command {
        Commands::Register(cmd) => handle_register(&service, cmd),
        Commands::Login(cmd) => handle_login(&service, cmd),
        Commands::ResetPassword(cmd) => handle_reset_password(&service, cmd),
        Commands::List(cmd) => handle_list(&service, cmd),
        Commands::Create(cmd) => handle_create(&service, cmd),
        Commands::Update(cmd) => handle_update(&service, cmd),
        Commands::Meta(cmd) => handle_meta(&service, cmd),
        Commands::Delete(cmd) => handle_delete(&service, cmd),
        Commands::Share(cmd) => handle_share(&service, cmd, true),
        Commands::Unshare(cmd) => handle_share(&service, cmd, false),
        Commands::History(cmd) => handle_history(&service, cmd),
        Commands::Restore(cmd) => handle_restore(&service, cmd),
        Commands::Export(cmd) => handle_export(&service, cmd),
        Commands::Import(cmd) => handle_import(&service, cmd),
        Commands::ShowPublic(cmd) => handle_show_public(&service, cmd),
        Commands::Tui(cmd) => {
            let user = resolve_user(&service, &cmd.user)?;
            nota::tui::run(&service, user, &config)
        }
    }
}

/// Resolves a username to the acting identity every note operation needs.
fn resolve_user(service: &NoteService, username: &str) -> Result<UserId> {
    let registry = UserRegistry::new(service.database());
    let user = registry.find_user(username)?;
    Ok(user.id())
}

fn handle_register(service: &NoteService, cmd: &RegisterCommand) -> Result<()> {
    let registry = UserRegistry::new(service.database());
    let user = registry.register(NewUser {
        username: &cmd.username,
        password: &cmd.password,
        security_question: &cmd.security_question,
        security_answer: &cmd.security_answer,
    })?;

    println!("Registered '{}'. You can now log in.", user.username());
    Ok(())
}

fn handle_login(service: &NoteService, cmd: &LoginCommand) -> Result<()> {
    let registry = UserRegistry::new(service.database());
    let user = registry.login(&cmd.username, &cmd.password)?;
    println!("Welcome back, {}.", user.username());
    Ok(())
}

fn handle_reset_password(service: &NoteService, cmd: &ResetPasswordCommand) -> Result<()> {
    let registry = UserRegistry::new(service.database());
    registry.reset_password(&cmd.username, &cmd.security_answer, &cmd.new_password)?;
    println!("Password updated successfully.");
    Ok(())
}

fn handle_list(service: &NoteService, cmd: &ListCommand) -> Result<()> {
    let user = resolve_user(service, &cmd.user)?;
    let sort = parse_sort(cmd.sort.as_deref())?;

    // The CLI reuses the client manager's projection so list output matches
    // what the TUI shows for the same search and sort inputs.
    let mut manager = nota::NoteManager::new();
    manager.set_notes(service.fetch_notes(user)?);
    if let Some(search) = &cmd.search {
        manager.set_search(search.clone());
    }
    manager.set_sort(sort);

    let visible = manager.projection();
    if visible.is_empty() {
        println!("No notes.");
        return Ok(());
    }

    let date_format = format_description::parse("[year]-[month]-[day] [hour]:[minute]")
        .expect("valid datetime format");
    for note in visible {
        let pin = if note.is_pinned() { "*" } else { " " };
        let public = if note.is_public() { " [public]" } else { "" };
        let tags = note
            .tags()
            .map(|t| format!("  ({t})"))
            .unwrap_or_default();
        let updated = note
            .updated_at()
            .format(&date_format)
            .unwrap_or_else(|_| "????-??-?? ??:??".to_string());
        println!(
            "{:>5} {pin} {}{tags}{public}  {updated}",
            note.id().get(),
            note.title(),
        );
    }
    Ok(())
}

fn handle_create(service: &NoteService, cmd: &CreateCommand) -> Result<()> {
    let user = resolve_user(service, &cmd.user)?;
    let note = service.create_note(
        user,
        cmd.title.as_deref(),
        &cmd.content,
        cmd.tags.as_deref(),
    )?;

    println!("Note created (id: {}, title: {:?})", note.id(), note.title());
    Ok(())
}

fn handle_update(service: &NoteService, cmd: &UpdateCommand) -> Result<()> {
    let user = resolve_user(service, &cmd.user)?;
    service.update_content(user, NoteId::new(cmd.note), &cmd.content, cmd.title.as_deref())?;
    println!("Note {} updated.", cmd.note);
    Ok(())
}

fn handle_meta(service: &NoteService, cmd: &MetaCommand) -> Result<()> {
    let user = resolve_user(service, &cmd.user)?;
    let patch = build_meta_patch(cmd);
    service.update_meta(user, NoteId::new(cmd.note), &patch)?;
    println!("Note {} metadata updated.", cmd.note);
    Ok(())
}

/// Builds the sparse patch from the flags actually given on the command
/// line, so omitted fields stay untouched.
fn build_meta_patch(cmd: &MetaCommand) -> NoteMetaPatch {
    let mut patch = NoteMetaPatch::default();
    if let Some(title) = &cmd.title {
        patch.title = Some(title.clone());
    }
    if cmd.clear_tags {
        patch.tags = Some(None);
    } else if let Some(tags) = &cmd.tags {
        patch.tags = Some(Some(tags.clone()));
    }
    if cmd.pin {
        patch.is_pinned = Some(true);
    } else if cmd.unpin {
        patch.is_pinned = Some(false);
    }
    patch
}

fn handle_delete(service: &NoteService, cmd: &DeleteCommand) -> Result<()> {
    let user = resolve_user(service, &cmd.user)?;

    if !cmd.yes
        && !confirm(&format!(
            "Delete note {} and its history? [y/N] ",
            cmd.note
        ))?
    {
        println!("Aborted.");
        return Ok(());
    }

    service.delete_note(user, NoteId::new(cmd.note))?;
    println!("Note {} deleted.", cmd.note);
    Ok(())
}

fn handle_share(service: &NoteService, cmd: &NoteRefCommand, public: bool) -> Result<()> {
    let user = resolve_user(service, &cmd.user)?;
    let note = service.set_public(user, NoteId::new(cmd.note), public)?;

    match note.public_token() {
        Some(token) => println!("Note {} is now public (token: {token})", note.id()),
        None => println!("Note {} is now private.", note.id()),
    }
    Ok(())
}

fn handle_history(service: &NoteService, cmd: &NoteRefCommand) -> Result<()> {
    let user = resolve_user(service, &cmd.user)?;
    let versions = service.history(user, NoteId::new(cmd.note))?;

    if versions.is_empty() {
        println!("No versions yet. Edits are versioned automatically.");
        return Ok(());
    }

    let date_format = format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")
        .expect("valid datetime format");
    for version in versions {
        let when = version
            .created_at()
            .format(&date_format)
            .unwrap_or_else(|_| "????-??-?? ??:??:??".to_string());
        println!(
            "{:>5}  {when}  {}",
            version.id().get(),
            version.preview().replace('\n', " "),
        );
    }
    Ok(())
}

fn handle_restore(service: &NoteService, cmd: &RestoreCommand) -> Result<()> {
    let user = resolve_user(service, &cmd.user)?;

    if !cmd.yes
        && !confirm(&format!(
            "Replace note {}'s content with version {}? [y/N] ",
            cmd.note, cmd.version
        ))?
    {
        println!("Aborted.");
        return Ok(());
    }

    service.restore_version(user, NoteId::new(cmd.note), VersionId::new(cmd.version))?;
    println!("Version {} restored.", cmd.version);
    Ok(())
}

fn handle_export(service: &NoteService, cmd: &ExportCommand) -> Result<()> {
    let user = resolve_user(service, &cmd.user)?;
    let payload = service.export_notes(user)?;
    let json = serde_json::to_string_pretty(&payload).context("Failed to serialize export")?;

    match &cmd.output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {} note(s) to {}", payload.notes.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn handle_import(service: &NoteService, cmd: &ImportCommand) -> Result<()> {
    let user = resolve_user(service, &cmd.user)?;
    let payload = std::fs::read_to_string(&cmd.file)
        .with_context(|| format!("Failed to read {}", cmd.file.display()))?;

    let imported = service.import_notes(user, &payload)?;
    println!("Imported {imported} note(s).");
    Ok(())
}

fn handle_show_public(service: &NoteService, cmd: &ShowPublicCommand) -> Result<()> {
    let note = service.lookup_public(&cmd.token)?;

    let date_format = format_description::parse("[year]-[month]-[day] [hour]:[minute]")
        .expect("valid datetime format");
    let updated = note
        .updated_at
        .format(&date_format)
        .unwrap_or_else(|_| "????-??-?? ??:??".to_string());

    println!("Note by {} (updated {updated})", note.username);
    println!();
    println!("{}", note.content);
    Ok(())
}

/// Parses a sort-mode argument. `None` selects the default.
fn parse_sort(arg: Option<&str>) -> Result<SortMode> {
    match arg {
        None => Ok(SortMode::default()),
        Some("updated") => Ok(SortMode::UpdatedDesc),
        Some("created") => Ok(SortMode::CreatedDesc),
        Some("title") => Ok(SortMode::TitleAsc),
        Some(other) => anyhow::bail!("Unknown sort mode '{other}' (expected updated, created, or title)"),
    }
}

/// Prompts for a yes/no answer on stdin. Defaults to no.
fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
