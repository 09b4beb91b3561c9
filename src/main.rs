use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};
use wayfarer::app::{App, AppError};
use wayfarer::config::{AppConfig, ConfigError};
use wayfarer::helpers::{FormAction, avatar_text};
use wayfarer::navigator::NavOutcome;
use wayfarer::routes::{RouteTable, RouteTableError};

const DEFAULT_SESSION_FILE: &str = ".wayfarer/session.json";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    App(#[from] AppError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("route table error: {0}")]
    Routes(#[from] RouteTableError),
    #[error("secondary project is not configured; set SUPABASE_SECONDARY_URL and SUPABASE_SECONDARY_ANON_KEY")]
    NoSecondaryProject,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "wayfarer", about = "Sign in, sign out, and walk the guarded routes of the travel app")]
struct Cli {
    #[arg(long, value_enum, default_value_t = Project::Primary)]
    project: Project,

    #[arg(long, env = "SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[arg(long, env = "ROUTES_FILE")]
    routes_file: Option<PathBuf>,

    #[arg(long, default_value = "/", help = "Location the app starts on")]
    at: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Project {
    Primary,
    Secondary,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        email: String,
        #[arg(long, env = "WAYFARER_PASSWORD")]
        password: String,
    },
    Signup {
        email: String,
        #[arg(long, env = "WAYFARER_PASSWORD")]
        password: String,
        #[arg(long)]
        full_name: Option<String>,
    },
    Logout,
    OauthUrl {
        provider: String,
        #[arg(long)]
        redirect_to: Option<String>,
    },
    /// Start the app on an OAuth redirect URL and report where it settles.
    Callback {
        url: String,
    },
    Visit {
        path: String,
    },
    Whoami,
    Routes,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    if let Command::Routes = cli.command {
        return run_routes(cli.routes_file.as_ref());
    }

    let mut config = AppConfig::from_env()?;
    config.session_file = cli
        .session_file
        .or(config.session_file)
        .or_else(|| Some(PathBuf::from(DEFAULT_SESSION_FILE)));
    config.routes_file = cli.routes_file.or(config.routes_file);

    let project = match cli.project {
        Project::Primary => config.primary.clone(),
        Project::Secondary => config.secondary.clone().ok_or(CliError::NoSecondaryProject)?,
    };

    let start_at = match &cli.command {
        Command::Callback { url } => url.clone(),
        _ => cli.at.clone(),
    };
    let app = App::start(&config, &project, &start_at).await?;
    let result = run_command(&app, cli.command).await;
    app.shutdown().await;
    result
}

async fn run_command(app: &App, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login { email, password } => match app.sign_in(&email, &password).await {
            Ok(_) => print_location(app).await,
            Err(e) => {
                if let AppError::Supabase(remote) = &e {
                    eprintln!("{}", serde_json::to_string_pretty(&FormAction::from_error(remote))?);
                }
                Err(e.into())
            }
        },
        Command::Signup { email, password, full_name } => {
            let outcome = app.sign_up(&email, &password, full_name.as_deref()).await?;
            let message = if outcome.session.is_some() {
                "Successfully registered"
            } else {
                "Successfully registered; check your email to confirm the account"
            };
            print_json(&json!({
                "user_id": outcome.user.id,
                "email": outcome.user.email,
                "signed_in": outcome.session.is_some(),
                "form": FormAction { form_success_message: message.to_owned(), ..FormAction::default() },
            }))?;
            print_location(app).await
        }
        Command::Logout => {
            app.sign_out().await;
            print_location(app).await
        }
        Command::OauthUrl { provider, redirect_to } => {
            let url = app
                .client()
                .oauth_authorize_url(&provider, redirect_to.as_deref())
                .map_err(AppError::from)?;
            println!("{url}");
            Ok(())
        }
        Command::Callback { .. } => print_location(app).await,
        Command::Visit { path } => {
            let outcome = app.visit(&path).await?;
            print_json(&outcome_json(&outcome))
        }
        Command::Whoami => match app.whoami().await? {
            Some(user) => {
                let name = user.display_name().unwrap_or_default().to_owned();
                print_json(&json!({
                    "id": user.id,
                    "email": user.email,
                    "name": name,
                    "avatar": avatar_text(&name),
                }))
            }
            None => print_json(&Value::Null),
        },
        Command::Routes => run_routes(None),
    }
}

fn run_routes(routes_file: Option<&PathBuf>) -> Result<(), CliError> {
    let table = match routes_file {
        Some(path) => RouteTable::load(path)?,
        None => RouteTable::default(),
    };
    let routes: Vec<Value> = table
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;
    print_json(&json!({
        "public_landing": table.public_landing(),
        "authenticated_landing": table.authenticated_landing(),
        "routes": routes,
    }))
}

fn outcome_json(outcome: &NavOutcome) -> Value {
    json!({
        "requested": outcome.requested.to_string(),
        "committed": outcome.committed.to_string(),
        "redirects": outcome
            .redirects
            .iter()
            .map(|r| json!({ "from": r.from, "to": r.to, "reason": r.reason.as_str() }))
            .collect::<Vec<_>>(),
    })
}

async fn print_location(app: &App) -> Result<(), CliError> {
    print_json(&json!({ "location": app.location().await.to_string() }))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
