use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use storyshare_sync::api::types::PushSubscription;
use storyshare_sync::api::{push, stories};
use storyshare_sync::cache::ProxyRequest;
use storyshare_sync::config::Config;
use storyshare_sync::queue::payload::mime_for_extension;
use storyshare_sync::state::AppState;
use storyshare_sync::sync::{submit_or_queue, StoryDraft, SyncDaemon, SyncRegistry, SyncStatus};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "storyshare", about = "Share stories, even while offline")]
struct Cli {
    /// Directory holding the offline queue and response cache
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and keep the session token in the OS keychain
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session token
    Logout,
    /// Register a push subscription (JSON file as handed out by the push service)
    PushSubscribe { subscription: PathBuf },
    /// Remove a push subscription
    PushUnsubscribe { subscription: PathBuf },
    /// Post a story; queued for later if it cannot be sent now
    Submit {
        #[arg(long)]
        description: String,
        #[arg(long)]
        photo: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// List stories waiting to be synced
    Queue,
    /// Replay queued stories now
    Sync,
    /// Fetch a URL through the response cache
    Fetch { url: String },
    /// Run the cache proxy and background sync until interrupted
    Daemon,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    log::debug!("Using data directory {}", config.data_dir.display());

    let state = Arc::new(AppState::new(config));
    if let Err(e) = run(state, cli.command).await {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(state: Arc<AppState>, command: Command) -> CliResult {
    match command {
        Command::Login { email, password } => login(&state, &email, &password).await,
        Command::Register {
            name,
            email,
            password,
        } => {
            let resp = stories::register(&state.api, &name, &email, &password).await?;
            println!("{}", resp.message);
            Ok(())
        }
        Command::PushSubscribe { subscription } => {
            push_subscription(&state, &subscription, true).await
        }
        Command::PushUnsubscribe { subscription } => {
            push_subscription(&state, &subscription, false).await
        }
        Command::Logout => {
            state.clear_session().await?;
            println!("Logged out");
            Ok(())
        }
        Command::Submit {
            description,
            photo,
            lat,
            lon,
        } => submit(&state, description, photo, lat, lon).await,
        Command::Queue => list_queue(&state).await,
        Command::Sync => sync_now(&state).await,
        Command::Fetch { url } => fetch(&state, &url).await,
        Command::Daemon => daemon(state).await,
    }
}

async fn login(state: &AppState, email: &str, password: &str) -> CliResult {
    let result = stories::login(&state.api, email, password).await?;
    state.save_session(&result.token).await?;
    log::info!("Logged in as {}", result.user_id);
    println!("Logged in as {}", result.name);
    Ok(())
}

async fn push_subscription(state: &AppState, file: &Path, subscribe: bool) -> CliResult {
    let subscription: PushSubscription = serde_json::from_slice(&tokio::fs::read(file).await?)?;
    let token = state
        .tokens
        .load_token()?
        .ok_or("Unauthorized: no login token found, run `storyshare login` first")?;

    let resp = if subscribe {
        push::subscribe(&state.api, &subscription, &token).await?
    } else {
        push::unsubscribe(&state.api, &subscription, &token).await?
    };
    println!("{}", resp.message);
    Ok(())
}

async fn submit(
    state: &AppState,
    description: String,
    photo_path: PathBuf,
    lat: Option<f64>,
    lon: Option<f64>,
) -> CliResult {
    let photo = tokio::fs::read(&photo_path).await?;
    let extension = photo_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let file_name = photo_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("photo.jpg")
        .to_string();

    let draft = StoryDraft {
        description,
        photo,
        photo_mime: mime_for_extension(extension).to_string(),
        file_name,
        lat,
        lon,
    };

    let registry = state.sync_registry();
    let outcome = submit_or_queue(
        state.api.as_ref(),
        state.tokens.as_ref(),
        &state.queue,
        registry.as_ref(),
        &draft,
    )
    .await?;
    println!("{}", outcome.message());
    Ok(())
}

async fn list_queue(state: &AppState) -> CliResult {
    let records = state.queue.list_all().await?;
    if records.is_empty() {
        println!("No stories waiting to sync");
        return Ok(());
    }
    for record in records {
        let coords = match (record.lat, record.lon) {
            (Some(lat), Some(lon)) => format!("{:.5}, {:.5}", lat, lon),
            _ => "-".to_string(),
        };
        println!("{}  {}  [{}]", record.id, record.excerpt(), coords);
    }
    Ok(())
}

/// Deliver one replay trigger from this process, acting as its own foreground.
async fn sync_now(state: &AppState) -> CliResult {
    let foreground = state.relay.connect().await;
    foreground.set_visible(true);
    let responder = tokio::spawn(foreground.serve(state.tokens.clone()));

    let result = state.replay_engine().replay().await;
    responder.abort();

    let report = result.inspect_err(|e| {
        eprintln!("{}", SyncStatus::from_error(e).label());
    })?;
    if report.is_noop() {
        println!("Nothing to sync");
        return Ok(());
    }
    println!("Uploaded {} stories", report.uploaded.len());
    if let Some(id) = report.discarded {
        println!(
            "Discarded {} after the login expired; {} left queued",
            id, report.skipped
        );
    }
    Ok(())
}

async fn fetch(state: &AppState, url: &str) -> CliResult {
    state.restore_session().await?;
    let proxy = state.cache_proxy();
    proxy.resume().await?;

    let mut request = ProxyRequest::get(url);
    if let Some(token) = state.api.access_token().await {
        request = request.with_header("Authorization", &format!("Bearer {}", token));
    }

    let response = proxy.handle(&request).await?;
    println!(
        "{} {:?} ({} bytes, from {:?})",
        response.status,
        response.kind,
        response.body.len(),
        response.source
    );

    // Let a background refresh finish before the process exits.
    proxy.settle().await;
    Ok(())
}

async fn daemon(state: Arc<AppState>) -> CliResult {
    log::info!("Story sync daemon starting...");

    let proxy = state.cache_proxy();
    if let Err(e) = proxy.start().await {
        log::warn!("Cache proxy failed to start: {}", e);
    }

    let foreground = state.relay.connect().await;
    foreground.set_visible(true);
    tokio::spawn(foreground.serve(state.tokens.clone()));

    let (registry, triggers) = SyncRegistry::channel(16);
    state.set_sync_registry(registry);

    let mut sync_daemon =
        SyncDaemon::new(state.replay_engine(), triggers).with_interval(state.config.sync_interval);

    tokio::select! {
        _ = sync_daemon.run() => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, stopping sync daemon");
        }
    }
    log::info!("Final sync status: {}", sync_daemon.status().label());
    Ok(())
}
