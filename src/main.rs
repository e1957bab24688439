use std::fs;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ladle::auth::TokenGenerator;
use ladle::config::{RecipeBounds, ServerConfig};
use ladle::server::{AppState, create_router};
use ladle::store::{SqliteStore, Store};
use ladle::types::{Ingredient, Token, User};

fn create_token(
    generator: &TokenGenerator,
    is_admin: bool,
    user_id: Option<String>,
) -> anyhow::Result<(Token, String)> {
    let (raw_token, lookup, hash) = generator.generate()?;
    let token = Token {
        id: Uuid::new_v4().to_string(),
        token_hash: hash,
        token_lookup: lookup,
        is_admin,
        user_id,
        created_at: Utc::now(),
        expires_at: None,
        last_used_at: None,
    };
    Ok((token, raw_token))
}

#[cfg(unix)]
fn set_restrictive_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "ladle")]
#[command(about = "A recipe sharing server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for database and media files
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Minimum accepted recipe cooking time, in minutes
        #[arg(long, default_value_t = 1)]
        min_cooking_time: i64,

        /// Maximum accepted recipe cooking time, in minutes
        #[arg(long, default_value_t = 32_000)]
        max_cooking_time: i64,

        /// Minimum accepted ingredient amount per recipe line
        #[arg(long, default_value_t = 1)]
        min_ingredient_amount: i64,

        /// Maximum accepted ingredient amount per recipe line
        #[arg(long, default_value_t = 32_000)]
        max_ingredient_amount: i64,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database and admin token)
    Init {
        /// Data directory for database and media files
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },

    /// Load the ingredient catalog from a CSV file (name,measurement_unit per line)
    ImportIngredients {
        /// Data directory for database and media files
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Path to the CSV file
        file: String,
    },
}

fn run_init(data_dir: String, non_interactive: bool) -> anyhow::Result<()> {
    let data_path: std::path::PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;

    let db_path = data_path.join("ladle.db");
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    let token_file = data_path.join(".admin_token");

    if store.has_admin_token()? {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let generator = TokenGenerator::new();
    let (token, raw_token) = create_token(&generator, true, None)?;

    store.create_token(&token)?;
    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    println!();
    println!("========================================");
    println!("Admin token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("Token also written to: {}", token_file.display());
    println!("========================================");
    println!();

    if !non_interactive {
        create_default_user_prompt(&store, &generator)?;
    }

    Ok(())
}

fn create_default_user_prompt(
    store: &SqliteStore,
    generator: &TokenGenerator,
) -> anyhow::Result<()> {
    let create_user = inquire::Confirm::new("Would you like to create a first user?")
        .with_default(false)
        .prompt()?;

    if !create_user {
        return Ok(());
    }

    let email = inquire::Text::new("Email:")
        .with_validator(|input: &str| {
            if input.contains('@') {
                Ok(inquire::validator::Validation::Valid)
            } else {
                Err("Email must contain '@'".into())
            }
        })
        .prompt()?;

    let username = inquire::Text::new("Username:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Err("Username cannot be empty".into())
            } else if input.contains(char::is_whitespace) {
                Err("Username cannot contain whitespace".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let password = inquire::Password::new("Password:").prompt()?;

    let now = Utc::now();
    let user_id = Uuid::new_v4().to_string();

    let user = User {
        id: user_id.clone(),
        email,
        username: username.clone(),
        first_name: String::new(),
        last_name: String::new(),
        password_hash: generator.hash(&password)?,
        avatar: None,
        created_at: now,
        updated_at: now,
    };

    store.create_user(&user)?;

    let (user_token, raw_token) = create_token(generator, false, Some(user_id))?;
    store.create_token(&user_token)?;

    println!();
    println!("========================================");
    println!("Created user '{username}' with token:");
    println!();
    println!("  {raw_token}");
    println!();
    println!("========================================");
    println!();

    Ok(())
}

fn run_import_ingredients(data_dir: String, file: String) -> anyhow::Result<()> {
    let data_path: std::path::PathBuf = data_dir.into();
    let store = SqliteStore::new(data_path.join("ladle.db"))?;
    store.initialize()?;

    let contents =
        fs::read_to_string(&file).with_context(|| format!("failed to read {file}"))?;

    let mut imported = 0usize;
    let mut skipped = 0usize;

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((name, unit)) = line.split_once(',') else {
            bail!("line {}: expected 'name,measurement_unit'", line_no + 1);
        };
        let (name, unit) = (name.trim(), unit.trim());
        if name.is_empty() || unit.is_empty() {
            bail!("line {}: expected 'name,measurement_unit'", line_no + 1);
        }

        if store.find_ingredient(name, unit)?.is_some() {
            skipped += 1;
            continue;
        }

        store.create_ingredient(&Ingredient {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        })?;
        imported += 1;
    }

    println!("Imported {imported} ingredients ({skipped} already present)");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ladle=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                non_interactive,
            } => {
                run_init(data_dir, non_interactive)?;
            }
            AdminCommands::ImportIngredients { data_dir, file } => {
                run_import_ingredients(data_dir, file)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            min_cooking_time,
            max_cooking_time,
            min_ingredient_amount,
            max_ingredient_amount,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                bounds: RecipeBounds {
                    min_cooking_time,
                    max_cooking_time,
                    min_ingredient_amount,
                    max_ingredient_amount,
                },
            };

            if config.bounds.min_cooking_time > config.bounds.max_cooking_time
                || config.bounds.min_ingredient_amount > config.bounds.max_ingredient_amount
            {
                bail!("Invalid bounds: minimum cannot exceed maximum");
            }

            let token_file = config.data_dir.join(".admin_token");
            if !token_file.exists() {
                bail!(
                    "Server not initialized. Run 'ladle admin init' first to create the database and admin token."
                );
            }

            let store = SqliteStore::new(config.db_path())?;
            if !store.has_admin_token()? {
                bail!(
                    "Server not initialized. Run 'ladle admin init' first to create the database and admin token."
                );
            }

            info!("Admin token available at {}", token_file.display());

            let state = Arc::new(AppState {
                store: Arc::new(store),
                data_dir: config.data_dir.clone(),
                bounds: config.bounds,
            });

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
