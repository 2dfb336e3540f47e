//! Command handlers wiring the application layer to the terminal.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use time::format_description::well_known::Rfc3339;

use taskrail_api::{HttpGateway, TokenSource};
use taskrail_app::{
    AppConfig, AuthManager, CredentialStore, DeleteConfirmation, DeleteOutcome, Notice,
    NoticeLevel, Notifier, TaskCacheCoordinator, TaskMutator,
};
use taskrail_core::{
    Credentials, Priority, Status, Task, TaskDraft, TaskFilter, TaskId, TaskPatch, User,
};

use crate::{Cli, Command};

const APP_DIR: &str = "taskrail";

/// Prints notices to stderr so stdout stays machine-readable.
struct TermNotifier;

impl Notifier for TermNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => eprintln!("{}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
        }
    }
}

struct App {
    auth: AuthManager<HttpGateway>,
    cache: Arc<TaskCacheCoordinator<HttpGateway>>,
    mutator: TaskMutator<HttpGateway, TermNotifier>,
}

fn app_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .context("could not determine the user config directory")
}

fn build_app(dir: &Path, api_url: Option<String>) -> Result<App> {
    let mut config = AppConfig::load(dir)?;
    if let Some(url) = api_url {
        config = config.with_base_url(url);
    }

    let credentials = Arc::new(CredentialStore::open(dir)?);
    let tokens: Arc<dyn TokenSource> = credentials.clone();
    let gateway = Arc::new(HttpGateway::new(&config.api.base_url, tokens)?);
    let cache = Arc::new(TaskCacheCoordinator::new(Arc::clone(&gateway)));
    let auth = AuthManager::new(Arc::clone(&gateway), credentials, Arc::clone(&cache));
    let mutator = TaskMutator::new(gateway, Arc::clone(&cache), TermNotifier);

    Ok(App {
        auth,
        cache,
        mutator,
    })
}

pub async fn run(cli: Cli) -> Result<()> {
    let app = build_app(&app_dir()?, cli.api_url)?;
    match cli.cmd {
        Command::Login { email, password } => {
            let user = app.auth.login(&Credentials { email, password }).await?;
            println!("Signed in as {}", user.email);
            Ok(())
        }

        Command::Register { email, password } => {
            let user = app.auth.register(&Credentials { email, password }).await?;
            println!("Account created; signed in as {}", user.email);
            Ok(())
        }

        Command::Logout => {
            app.auth.logout().await?;
            println!("Signed out");
            Ok(())
        }

        Command::Whoami => {
            let state = app.auth.bootstrap().await?;
            match state.user() {
                Some(user) => print_user(user),
                None => bail!("not signed in; run `taskrail login` first"),
            }
            Ok(())
        }

        Command::List {
            status,
            priority,
            search,
            page,
            per_page,
            json,
            stats,
        } => {
            require_session(&app).await?;
            let filter = TaskFilter {
                status: parse_opt::<Status>(status, "status")?,
                priority: parse_opt::<Priority>(priority, "priority")?,
                search,
                page,
                per_page,
            };
            handle_list(&app, &filter, json, stats).await
        }

        Command::Add {
            title,
            description,
            priority,
        } => handle_add(&app, title, description, &priority).await,

        Command::Done { id } => set_status(&app, &id, Status::Completed).await,
        Command::Reopen { id } => set_status(&app, &id, Status::Pending).await,

        Command::Edit {
            id,
            title,
            description,
            priority,
        } => handle_edit(&app, &id, title, description, priority).await,

        Command::Rm { id, yes } => handle_rm(&app, &id, yes).await,
    }
}

async fn handle_add(
    app: &App,
    title: String,
    description: Option<String>,
    priority: &str,
) -> Result<()> {
    require_session(app).await?;
    let draft = TaskDraft {
        title,
        description,
        status: Status::Pending,
        priority: parse_value::<Priority>(priority, "priority")?,
    };
    let task = app.mutator.create(draft).await?;
    print_task(&task)
}

async fn handle_edit(
    app: &App,
    id: &str,
    title: Option<String>,
    description: Option<String>,
    priority: Option<String>,
) -> Result<()> {
    require_session(app).await?;
    let patch = TaskPatch {
        title,
        description,
        status: None,
        priority: parse_opt::<Priority>(priority, "priority")?,
    };
    let task = app.mutator.update(parse_id(id)?, patch).await?;
    print_task(&task)
}

async fn handle_rm(app: &App, id: &str, yes: bool) -> Result<()> {
    require_session(app).await?;
    let id = parse_id(id)?;
    let confirmation = if yes {
        DeleteConfirmation::Confirmed
    } else {
        confirm_delete(id)?
    };
    match app.mutator.delete(id, confirmation).await? {
        DeleteOutcome::Deleted => {}
        DeleteOutcome::Cancelled => println!("Cancelled"),
    }
    Ok(())
}

/// Resolve the stored session before a task command runs.
async fn require_session(app: &App) -> Result<()> {
    let state = app.auth.bootstrap().await?;
    if !state.is_authenticated() {
        bail!("not signed in; run `taskrail login` first");
    }
    Ok(())
}

async fn handle_list(app: &App, filter: &TaskFilter, json: bool, stats: bool) -> Result<()> {
    let view = app.cache.read(filter).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&view.tasks)?);
    } else {
        for task in &view.tasks {
            let mark = match task.status {
                Status::Completed => "x",
                Status::Pending => " ",
            };
            println!(
                "[{mark}] {}  {:<6}  {}",
                task.id,
                task.priority.as_str(),
                task.title
            );
        }
        println!("{} of {} task(s)", view.tasks.len(), view.total);
    }
    if stats {
        let stats = app.cache.stats().await?;
        println!("{} completed, {} pending", stats.completed, stats.pending);
    }
    Ok(())
}

async fn set_status(app: &App, id: &str, status: Status) -> Result<()> {
    require_session(app).await?;
    let task = app
        .mutator
        .update(parse_id(id)?, TaskPatch::status_only(status))
        .await?;
    print_task(&task)
}

fn confirm_delete(id: TaskId) -> Result<DeleteConfirmation> {
    eprint!("delete task {id}? [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
        Ok(DeleteConfirmation::Confirmed)
    } else {
        Ok(DeleteConfirmation::Cancelled)
    }
}

fn parse_id(raw: &str) -> Result<TaskId> {
    raw.parse()
        .map_err(|err| anyhow!("invalid task id '{raw}': {err}"))
}

fn parse_value<T>(raw: &str, what: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse()
        .map_err(|err| anyhow!("invalid {what} '{raw}': {err}"))
}

fn parse_opt<T>(raw: Option<String>, what: &str) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = String>,
{
    raw.map(|value| parse_value(&value, what)).transpose()
}

fn print_task(task: &Task) -> Result<()> {
    println!("id:          {}", task.id);
    println!("title:       {}", task.title);
    if let Some(description) = &task.description {
        println!("description: {description}");
    }
    println!("status:      {}", task.status);
    println!("priority:    {}", task.priority);
    println!("created:     {}", task.created_at.format(&Rfc3339)?);
    Ok(())
}

fn print_user(user: &User) {
    println!("id:    {}", user.id);
    println!("email: {}", user.email);
}
