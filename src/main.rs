use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use askdb::config::Settings;
use askdb::core::{Session, SqlGenerator};
use askdb::error::AgentError;
use askdb::integrations::gemini::{GeminiClient, GeminiConfig};
use askdb::sql::{format_results_as_table, DatabaseKind, QueryResult};

#[derive(Debug, Parser)]
#[command(
    name = "askdb",
    version,
    about = "Ask your database questions in plain language"
)]
struct Cli {
    /// Database engine to connect to
    #[arg(long, value_enum, default_value_t = Engine::Sqlite)]
    engine: Engine,

    /// Database file for the embedded engine (omit for an in-memory database)
    #[arg(long)]
    path: Option<PathBuf>,

    /// Database server host
    #[arg(long)]
    host: Option<String>,

    /// Database server port
    #[arg(long)]
    port: Option<u16>,

    /// Database name
    #[arg(long)]
    database: Option<String>,

    /// Database user
    #[arg(long)]
    user: Option<String>,

    /// Database password
    #[arg(long)]
    password: Option<String>,

    /// Model identifier used for SQL generation
    #[arg(long)]
    model: Option<String>,

    /// Sampling temperature used for SQL generation
    #[arg(long)]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Engine {
    Sqlite,
    Mysql,
    Postgres,
}

impl From<Engine> for DatabaseKind {
    fn from(engine: Engine) -> Self {
        match engine {
            Engine::Sqlite => DatabaseKind::Sqlite,
            Engine::Mysql => DatabaseKind::MySql,
            Engine::Postgres => DatabaseKind::Postgres,
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    askdb::init_with_logger(true)?;

    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    if cli.path.is_some() {
        settings.db_path = cli.path.clone();
    }
    if cli.host.is_some() {
        settings.db_host = cli.host.clone();
    }
    if cli.port.is_some() {
        settings.db_port = cli.port;
    }
    if cli.database.is_some() {
        settings.db_name = cli.database.clone();
    }
    if cli.user.is_some() {
        settings.db_user = cli.user.clone();
    }
    if cli.password.is_some() {
        settings.db_password = cli.password.clone();
    }
    if cli.model.is_some() {
        settings.model = cli.model.clone();
    }
    if cli.temperature.is_some() {
        settings.temperature = cli.temperature;
    }

    let config = settings.connection_config(cli.engine.into())?;

    let mut gemini_config = GeminiConfig {
        api_key: settings.api_key.clone(),
        ..Default::default()
    };
    if let Some(model) = &settings.model {
        gemini_config.model = model.clone();
    }
    if let Some(temperature) = settings.temperature {
        gemini_config.temperature = Some(temperature);
    }

    let client = GeminiClient::new(gemini_config).context("Failed to create model client")?;
    let mut session = Session::new(SqlGenerator::new(Box::new(client)));

    session
        .connect(&config)
        .await
        .context("Failed to connect to the database")?;

    println!(
        "Connected to {}",
        session.connection_label().unwrap_or_default()
    );
    println!("Type a question, or \\schema, \\history, \\csv <file>, \\quit");

    let stdin = io::stdin();
    let mut last_result: Option<QueryResult> = None;

    loop {
        print!("ask> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('\\') {
            match handle_command(command, &mut session, &last_result).await {
                Flow::Quit => break,
                Flow::Continue => continue,
            }
        }

        let sql = match session.generate(line).await {
            Ok(sql) => sql,
            Err(AgentError::NoStatement) => {
                eprintln!("The model did not return a SQL statement. Try rephrasing the question.");
                continue;
            }
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        println!("\nGenerated SQL:\n{sql}\n");
        print!("Run this query? [Y/e(dit)/n] ");
        io::stdout().flush()?;

        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;

        let sql_to_run = match answer.trim().to_lowercase().as_str() {
            "n" | "no" => continue,
            "e" | "edit" => {
                print!("sql> ");
                io::stdout().flush()?;
                let mut edited = String::new();
                stdin.lock().read_line(&mut edited)?;
                let edited = edited.trim().to_string();
                if edited.is_empty() {
                    continue;
                }
                edited
            }
            _ => sql,
        };

        match session.run(&sql_to_run).await {
            Ok(result) => {
                println!("{}", format_results_as_table(&result));
                last_result = Some(result);
            }
            Err(e) => eprintln!("{e}"),
        }
    }

    session.disconnect().await?;
    info!("Session ended");

    Ok(())
}

async fn handle_command(
    command: &str,
    session: &mut Session,
    last_result: &Option<QueryResult>,
) -> Flow {
    match command {
        "q" | "quit" => return Flow::Quit,
        "schema" => match session.schema().await {
            Ok(schema) if schema.is_empty() => println!("(no user tables)"),
            Ok(schema) => println!("{}", schema.render()),
            Err(e) => eprintln!("{e}"),
        },
        "history" => {
            let mut empty = true;
            for (i, entry) in session.history().enumerate() {
                empty = false;
                println!(
                    "{}. [{}] {}",
                    i + 1,
                    entry.asked_at.format("%H:%M:%S"),
                    entry.question
                );
                println!("   {}", entry.sql);
            }
            if empty {
                println!("No queries yet.");
            }
        }
        _ => {
            if let Some(path) = command.strip_prefix("csv ") {
                match last_result {
                    Some(result) => match std::fs::write(path.trim(), result.to_csv()) {
                        Ok(()) => println!("Saved to {}", path.trim()),
                        Err(e) => eprintln!("Could not write {}: {}", path.trim(), e),
                    },
                    None => eprintln!("No query result to export yet."),
                }
            } else {
                eprintln!("Unknown command: \\{command}");
            }
        }
    }

    Flow::Continue
}
