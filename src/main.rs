//! # DocuMentor CLI (`documentor`)
//!
//! Builds the document index at startup, then answers questions about the
//! knowledge base.
//!
//! ## Usage
//!
//! ```bash
//! documentor --config ./config/config.toml [chat]
//! documentor --config ./config/config.toml ask "<question>"
//! ```
//!
//! Exits with `0` when the session ends normally (exit keyword, end of
//! input or Ctrl-C, including during the index build) and `1` when setup
//! fails, a single `ask` question cannot be answered, or an unexpected error
//! occurs.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use documentor::config::Config;
use documentor::logging::{LogSettings, Logger, LoggingManager, DEFAULT_LOGGER_NAME};
use documentor::repl;
use documentor::service::{AiService, Backends};

static LOGGING: LoggingManager = LoggingManager::new();

/// DocuMentor: ask questions about a folder of documents.
#[derive(Parser)]
#[command(
    name = "documentor",
    about = "DocuMentor: answers questions about a folder of documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/config.toml")]
    config: PathBuf,

    /// Override `LOG.level` from the configuration file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive question loop (default).
    Chat,

    /// Answer a single question and exit.
    Ask {
        /// The question to answer.
        question: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start the async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let code = runtime.block_on(run(cli));
    // A stdin read may still be parked on a blocking thread.
    runtime.shutdown_background();
    code
}

async fn run(cli: Cli) -> ExitCode {
    dotenvy::dotenv().ok();
    println!("DocuMentor starting...");

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let settings = LogSettings::new(DEFAULT_LOGGER_NAME, &config.main_log_file_path).level(level);
    let logger = match LOGGING.initialize(&settings) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Logging setup error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logger.install_global() {
        logger.warning(format!("Library diagnostics not captured: {}", e));
    }
    logger.info("DocuMentor starting...");
    logger.debug(format!("Configuration loaded: {:?}", config));

    let interrupt = interrupted();
    tokio::pin!(interrupt);
    let command = cli.command.unwrap_or(Commands::Chat);

    let code = match session(&config, &logger, command, interrupt).await {
        Ok(Ending::Completed) => ExitCode::SUCCESS,
        Ok(Ending::Interrupted) => {
            if let Err(e) = repl::report_interrupt(&mut std::io::stdout(), &logger) {
                logger.error(format!("Failed to write interrupt message: {}", e));
            }
            ExitCode::SUCCESS
        }
        Ok(Ending::QuestionFailed) => ExitCode::FAILURE,
        Err(e) => {
            logger.critical(format!("Unexpected error: {:#}", e));
            eprintln!("\nError: {:#}", e);
            ExitCode::FAILURE
        }
    };

    if let Err(e) = repl::farewell(&mut std::io::stdout(), &logger) {
        logger.error(format!("Failed to write closing message: {}", e));
    }
    code
}

/// How a session that did not hit an unexpected error came to an end.
enum Ending {
    Completed,
    /// Ctrl-C outside the question loop, which reports its own interrupts.
    Interrupted,
    /// `ask` could not answer; the reason is already on stderr.
    QuestionFailed,
}

async fn session<I>(
    config: &Config,
    logger: &Logger,
    command: Commands,
    mut interrupt: Pin<&mut I>,
) -> Result<Ending>
where
    I: Future<Output = ()>,
{
    let backends = Backends::openai(config)?;
    let service = tokio::select! {
        biased;
        _ = &mut interrupt => return Ok(Ending::Interrupted),
        service = AiService::start(config, logger.clone(), &backends) => service?,
    };

    match command {
        Commands::Chat => {
            println!(
                "\nDocuMentor is ready. Ask anything about the documents in {}",
                config.input_kb_folder.display()
            );
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            let outcome =
                repl::run(input, &mut std::io::stdout(), &service, logger, interrupt).await?;
            logger.debug(format!("Session ended: {:?}", outcome));
            Ok(Ending::Completed)
        }
        Commands::Ask { question } => {
            let result = tokio::select! {
                biased;
                _ = &mut interrupt => return Ok(Ending::Interrupted),
                result = service.answer(&question) => result,
            };
            match result {
                Ok(answer) => {
                    println!("{}", answer);
                    Ok(Ending::Completed)
                }
                Err(e) => {
                    logger.error(format!("Question not answered: {}", e));
                    eprintln!("{}", e.user_message());
                    Ok(Ending::QuestionFailed)
                }
            }
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
