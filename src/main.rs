use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use ledgerleaf::{
    ConfigFile, Currency, DirectoryTarget, DraftStore, EditorSession, GenerationOutcome,
    GeneratorConfig, Invoice, LedgerLeafError, OutputAction, RenderMode, Theme, TracingNotifier,
};

#[derive(Parser)]
#[command(name = "ledgerleaf", version, about = "Render invoices to PDF")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an invoice JSON file to PDF
    Render {
        invoice: PathBuf,
        /// Produce a preview instead of a download
        #[arg(long)]
        preview: bool,
        #[arg(long, value_enum, default_value_t = ThemeArg::Light)]
        theme: ThemeArg,
        /// Render without editing affordances
        #[arg(long)]
        flattened: bool,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// TOML generator settings
        #[arg(long)]
        config: Option<PathBuf>,
        /// Also save the invoice as a draft in this file
        #[arg(long)]
        drafts: Option<PathBuf>,
    },
    /// Manage saved drafts
    Drafts {
        #[command(subcommand)]
        action: DraftsAction,
        #[arg(long, global = true, default_value = "drafts.json")]
        drafts: PathBuf,
    },
    /// List the currency catalog
    Currencies,
}

#[derive(Subcommand)]
enum DraftsAction {
    List,
    Save { invoice: PathBuf },
    Delete { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgerleaf=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Render {
            invoice,
            preview,
            theme,
            flattened,
            out,
            config,
            drafts,
        } => {
            let action = if preview {
                OutputAction::Preview
            } else {
                OutputAction::Download
            };
            let mode = if flattened {
                RenderMode::Flattened
            } else {
                RenderMode::Editable
            };
            render(
                &invoice,
                action,
                theme.into(),
                mode,
                out,
                config.as_deref(),
                drafts,
            )
            .await
        }
        Commands::Drafts { action, drafts } => run_drafts(action, &drafts).await,
        Commands::Currencies => {
            for currency in Currency::catalog() {
                println!(
                    "{} {:<4} {:<4} {}",
                    currency.flag, currency.code, currency.symbol, currency.name
                );
            }
            Ok(true)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn load_invoice(path: &Path) -> Result<Invoice, LedgerLeafError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| LedgerLeafError::Read(format!("{}: {e}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| LedgerLeafError::Read(format!("{}: {e}", path.display())))
}

fn load_config(path: Option<&Path>) -> Result<GeneratorConfig, LedgerLeafError> {
    let builder = GeneratorConfig::builder();
    let builder = match path {
        Some(path) => ConfigFile::load(path)?.apply(builder)?,
        None => builder,
    };
    builder.build()
}

async fn render(
    invoice_path: &Path,
    action: OutputAction,
    theme: Theme,
    mode: RenderMode,
    out: PathBuf,
    config: Option<&Path>,
    drafts: Option<PathBuf>,
) -> Result<bool, LedgerLeafError> {
    let invoice = load_invoice(invoice_path).await?;
    let config = load_config(config)?;
    let mut session = EditorSession::new(
        config,
        invoice,
        Arc::new(DirectoryTarget::new(out)),
        Arc::new(TracingNotifier),
    )?;
    if let Some(path) = drafts {
        session = session.with_drafts(DraftStore::open(path));
        let id = session.save_draft()?;
        println!("draft {id}");
    }
    session.set_theme(theme);
    session.set_mode(mode);

    match session.generate(action).await {
        GenerationOutcome::Downloaded(saved) => {
            println!("{}", saved.location.display());
            Ok(true)
        }
        GenerationOutcome::Previewed(url) => {
            let controller = session.controller();
            let saved = controller.download_preview()?;
            println!("{url} -> {}", saved.location.display());
            controller.close_preview();
            Ok(true)
        }
        GenerationOutcome::Skipped(reason) => {
            tracing::warn!(?reason, "nothing generated");
            Ok(false)
        }
        GenerationOutcome::Failed { .. } => Ok(false),
    }
}

async fn run_drafts(action: DraftsAction, path: &Path) -> Result<bool, LedgerLeafError> {
    let mut store = DraftStore::open(path);
    match action {
        DraftsAction::List => {
            for draft in store.list() {
                println!(
                    "{}  {}  {}",
                    draft.id,
                    draft.saved_at.format("%Y-%m-%d %H:%M"),
                    draft.display_label()
                );
            }
            Ok(true)
        }
        DraftsAction::Save { invoice } => {
            let invoice = load_invoice(&invoice).await?;
            let draft = store.save(&invoice);
            println!("{}", draft.id);
            Ok(true)
        }
        DraftsAction::Delete { id } => {
            if store.delete(&id) {
                Ok(true)
            } else {
                Err(LedgerLeafError::Draft(format!("no draft with id {id}")))
            }
        }
    }
}
