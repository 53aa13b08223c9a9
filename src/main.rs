//! hdl-forge CLI
//!
//! Usage:
//!   hdl-forge generate --description "8-bit UART transmitter" --language verilog \
//!       --deliverable rtlCode --deliverable testbench --out-dir out/
//!   hdl-forge prompt --description-file design.txt --language vhdl
//!   hdl-forge deliverables

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hdl_forge::clients::GeminiClient;
use hdl_forge::config::{Config, RuntimeConfig};
use hdl_forge::viewer;
use hdl_forge::{
    DeliverableKind, DeliverableSelection, DesignRequest, GenerateOutcome, GenerationSession,
    HdlLanguage, SkipReason,
};

#[derive(Parser)]
#[command(name = "hdl-forge")]
#[command(
    about = "Generate RTL, UVM verification and documentation with Gemini",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call the model and show the generated files
    Generate {
        #[command(flatten)]
        form: FormArgs,
        /// Write every generated file into this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Deliverable to display instead of the first one returned
        #[arg(long)]
        show: Option<String>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the composed prompt and response schema without calling the model
    Prompt {
        #[command(flatten)]
        form: FormArgs,
    },
    /// List deliverable ids, labels and default selection
    Deliverables,
}

#[derive(Args)]
struct FormArgs {
    /// Free-text design description
    #[arg(long, conflicts_with = "description_file")]
    description: Option<String>,
    /// Read the design description from a file
    #[arg(long)]
    description_file: Option<PathBuf>,
    /// Target HDL (vhdl or verilog)
    #[arg(long, default_value_t = HdlLanguage::Verilog)]
    language: HdlLanguage,
    /// Deliverable id to request; repeatable
    #[arg(long = "deliverable")]
    deliverables: Vec<String>,
}

impl FormArgs {
    fn into_request(self) -> Result<DesignRequest> {
        let description = match (self.description, self.description_file) {
            (Some(text), _) => text,
            (None, Some(path)) => std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            (None, None) => bail!("one of --description or --description-file is required"),
        };
        let requested = if self.deliverables.is_empty() {
            DeliverableSelection::new().requested()
        } else {
            self.deliverables
        };
        for id in &requested {
            if DeliverableKind::from_id(id).is_none() {
                tracing::warn!("'{}' is not a known deliverable; passing it through verbatim", id);
            }
        }
        Ok(DesignRequest::new(description, self.language, requested))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    Config::load_env_file();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(RuntimeConfig::log_level_from_env()))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().context("Failed to load configuration")?;

    match cli.command {
        Commands::Generate {
            form,
            out_dir,
            show,
            json,
        } => generate(&config, form.into_request()?, out_dir, show, json).await,
        Commands::Prompt { form } => prompt(form.into_request()?),
        Commands::Deliverables => {
            deliverables();
            Ok(())
        }
    }
}

async fn generate(
    config: &Config,
    request: DesignRequest,
    out_dir: Option<PathBuf>,
    show: Option<String>,
    json: bool,
) -> Result<()> {
    let client = GeminiClient::from_config(config)
        .context("Gemini client unavailable (set GEMINI_API_KEY)")?;
    let session = GenerationSession::from_config(Arc::new(client), config);

    let mut status_rx = session.subscribe_status();
    let status_printer = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let text = status_rx.borrow_and_update().clone();
            if !text.is_empty() {
                eprintln!("  {}", text);
            }
        }
    });

    let outcome = session.generate(&request).await;
    status_printer.abort();

    match outcome {
        GenerateOutcome::Skipped(SkipReason::EmptyDescription) => {
            bail!("design description is empty")
        }
        GenerateOutcome::Skipped(SkipReason::Busy) => bail!("a generation is already running"),
        GenerateOutcome::Failed(message) => bail!(message),
        GenerateOutcome::Succeeded(output) => {
            if output.is_empty() {
                eprintln!("The model returned no usable files.");
            }
            if let Some(key) = show.as_deref()
                && !session.select(key)
            {
                tracing::warn!("'{}' was not returned; showing the first file instead", key);
            }
            let view = session.snapshot();

            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print!("{}", viewer::render(&output, view.active.as_deref()));
            }

            if let Some(dir) = out_dir {
                for path in viewer::write_files(&dir, &output)? {
                    eprintln!("wrote {}", path.display());
                }
            }
            Ok(())
        }
    }
}

fn prompt(request: DesignRequest) -> Result<()> {
    let composed = request.compose();
    println!("{}", composed.prompt);
    println!();
    println!("{}", serde_json::to_string_pretty(&composed.schema)?);
    Ok(())
}

fn deliverables() {
    let languages = HdlLanguage::ALL
        .iter()
        .map(|l| l.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    println!("Languages: {}", languages);
    for option in DeliverableSelection::new().options() {
        println!(
            "  [{}] {:<18} {}",
            if option.checked { "x" } else { " " },
            option.id,
            option.label
        );
    }
}
