use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;

use desizone_playlist_lib::commands::config_commands;
use desizone_playlist_lib::commands::playlist_commands::{
    self, PlaylistRequest, DEFAULT_PREVIEW_LIMIT,
};
use desizone_playlist_lib::db::library::Filters;
use desizone_playlist_lib::db::local::EngineConfig;
use desizone_playlist_lib::db::playlists;
use desizone_playlist_lib::error::{ErrorKind, GenerationError};
use desizone_playlist_lib::scheduler::rotation::GenerationOptions;
use desizone_playlist_lib::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "playlist-engine", version, about = "Rotation-aware playlist generation")]
struct Cli {
    /// SQLite database holding the library and generated playlists
    #[arg(long, env = "PLAYLIST_DB", default_value = "playlist.db")]
    db: String,

    /// Overrides the configured export directory
    #[arg(long, env = "PLAYLIST_EXPORT_DIR")]
    export_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a playlist and save it under `name`, replacing any previous one.
    Generate {
        #[arg(long)]
        name: String,
        /// Generation options as JSON, or `@path` to read them from a file
        #[arg(long)]
        options: String,
        #[arg(long)]
        description: Option<String>,
        /// Also write an .m3u file
        #[arg(long)]
        export: bool,
    },

    /// Show a sample of what `generate` would produce without saving anything.
    Preview {
        #[arg(long)]
        options: String,
        #[arg(long, default_value_t = DEFAULT_PREVIEW_LIMIT)]
        limit: usize,
    },

    /// Count the tracks a filter set matches.
    Estimate {
        /// Filters as JSON, or `@path`
        #[arg(long, default_value = "{}")]
        filters: String,
    },

    /// Print a saved playlist with its ordered entries.
    Show {
        #[arg(long)]
        name: String,
    },

    /// Print the engine configuration, or replace it with `--set`.
    Config {
        /// Configuration as JSON, or `@path`; omitted fields take their defaults
        #[arg(long)]
        set: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::Input => 1,
                ErrorKind::EmptyResult | ErrorKind::Collaborator => 2,
            };
            match serde_json::to_string_pretty(&e) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{e}"),
            }
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<(), GenerationError> {
    let mut state = AppState::open(&cli.db).await?;
    if let Some(dir) = cli.export_dir {
        state = state.with_export_dir(dir);
    }

    match cli.command {
        Command::Generate {
            name,
            options,
            description,
            export,
        } => {
            let request = PlaylistRequest {
                name,
                description,
                export,
                options: parse_json_arg::<GenerationOptions>(&options)?,
            };
            print_json(&playlist_commands::generate_playlist(&state, &request).await?)
        }
        Command::Preview { options, limit } => {
            let options = parse_json_arg::<GenerationOptions>(&options)?;
            print_json(&playlist_commands::preview_playlist(&state, &options, limit).await?)
        }
        Command::Estimate { filters } => {
            let filters = parse_json_arg::<Filters>(&filters)?;
            let pool_size = playlist_commands::estimate_pool_size(&state, &filters).await?;
            print_json(&serde_json::json!({ "pool_size": pool_size }))
        }
        Command::Show { name } => match playlists::load_playlist(&state.local_db, name.trim()).await? {
            Some(playlist) => print_json(&playlist),
            None => Err(GenerationError::InvalidInput(format!(
                "no playlist named '{}'",
                name.trim()
            ))),
        },
        Command::Config { set: None } => print_json(&config_commands::get_engine_config(&state)),
        Command::Config { set: Some(json) } => {
            let config = parse_json_arg::<EngineConfig>(&json)?;
            print_json(&config_commands::set_engine_config(&mut state, config).await?)
        }
    }
}

/// Parse inline JSON, or the contents of a file when the argument starts with `@`.
fn parse_json_arg<T: DeserializeOwned>(arg: &str) -> Result<T, GenerationError> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| GenerationError::InvalidInput(format!("cannot read {path}: {e}")))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).map_err(|e| GenerationError::InvalidInput(format!("bad JSON: {e}")))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), GenerationError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| GenerationError::InvalidInput(format!("cannot encode result: {e}")))?;
    println!("{json}");
    Ok(())
}
