//! quadscan CLI: process one item of a collection and print it as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use quadscan::source::secrets::DEFAULT_SECRETS_FILE;
use quadscan::source::{ClientSecrets, TokenGrant};
use quadscan::{
    batch, CollectionMode, Credential, FolderRef, JsonPresenter, Presenter, Scanner,
    ScannerConfig, SessionContext,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "quadscan")]
#[command(about = "Locate and decode QR codes and ChArUco boards in local, shared or remote images")]
#[command(version)]
struct Cli {
    /// JSON scanner config; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Embed original, annotated and crop images as data URIs.
    #[arg(long, global = true)]
    images: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one of the given image files.
    Local {
        paths: Vec<PathBuf>,
        #[command(flatten)]
        item: ItemArgs,
    },

    /// Scan a directory tree and process one image from it.
    Shared {
        /// Root to scan; the configured shared root when omitted.
        root: Option<PathBuf>,
        #[command(flatten)]
        item: ItemArgs,
    },

    /// Process one image of a remote folder.
    Remote {
        /// Folder share link or bare folder id.
        #[arg(long)]
        folder: String,
        /// Stored credential (JSON). Rewritten when the token is refreshed.
        #[arg(long)]
        credential: PathBuf,
        #[command(flatten)]
        item: ItemArgs,
    },

    /// Turn a consent-flow token response into a stored credential for `remote`.
    ///
    /// Client secrets come from `GOOGLE_OAUTH_CREDENTIALS`, else `--secrets`.
    Login {
        /// Token endpoint response (JSON) from the completed consent flow.
        #[arg(long)]
        grant: PathBuf,
        /// Where to write the credential.
        #[arg(long)]
        credential: PathBuf,
        #[arg(long, default_value = DEFAULT_SECRETS_FILE)]
        secrets: PathBuf,
    },

    /// Write `_qr_all` and `_qr_N` images next to every image in a directory.
    Batch { dir: PathBuf },
}

#[derive(Debug, Clone, Args)]
struct ItemArgs {
    /// Zero-based item index.
    #[arg(long, default_value_t = 0)]
    index: i64,
}

fn init_logging(verbose: u8) {
    #[cfg(feature = "tracing")]
    {
        let _ = verbose;
        quadscan::core::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let level = quadscan::core::level_from_verbosity(verbose.saturating_add(1));
        if let Err(err) = quadscan::core::init_with_level(level) {
            eprintln!("logger setup failed: {err}");
        }
    }
}

fn presenter(cli: &Cli, config: &ScannerConfig) -> JsonPresenter {
    if cli.images {
        JsonPresenter::new(config.jpeg_quality)
    } else {
        JsonPresenter::metadata_only()
    }
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => ScannerConfig::load_json(path)?,
        None => ScannerConfig::default(),
    };
    let presenter = presenter(&cli, &config);

    match &cli.command {
        Commands::Batch { dir } => {
            let pipeline = config.build_pipeline();
            let report = batch::process_directory(dir, pipeline.code_locator())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Local { paths, item } => {
            let scanner = Scanner::new(config.clone(), config.build_pipeline());
            let mut session = SessionContext::new();
            scanner.set_local_collection(&mut session, paths.iter().cloned());
            let response = scanner.get_item(&mut session, CollectionMode::Local, item.index);
            println!("{}", serde_json::to_string_pretty(&presenter.render(&response)?)?);
            Ok(())
        }
        Commands::Shared { root, item } => {
            let scanner = Scanner::new(config.clone(), config.build_pipeline());
            let mut session = SessionContext::new();
            scanner.set_shared_collection(&mut session, root.as_deref())?;
            let response = scanner.get_item(&mut session, CollectionMode::Shared, item.index);
            println!("{}", serde_json::to_string_pretty(&presenter.render(&response)?)?);
            Ok(())
        }
        Commands::Remote {
            folder,
            credential,
            item,
        } => run_remote(config, &presenter, folder, credential, item),
        Commands::Login {
            grant,
            credential,
            secrets,
        } => run_login(grant, credential, secrets),
    }
}

fn run_login(grant_path: &Path, credential_path: &Path, secrets_path: &Path) -> CliResult<()> {
    let secrets = ClientSecrets::discover(secrets_path)?;
    let grant: TokenGrant = serde_json::from_str(&fs::read_to_string(grant_path)?)?;
    let credential = Credential::for_drive(&secrets, grant)?;
    fs::write(credential_path, serde_json::to_string_pretty(&credential)?)?;
    log::info!("credential written to {}", credential_path.display());
    Ok(())
}

fn run_remote(
    config: ScannerConfig,
    presenter: &JsonPresenter,
    folder: &str,
    credential_path: &Path,
    item: &ItemArgs,
) -> CliResult<()> {
    let stored: Credential = serde_json::from_str(&fs::read_to_string(credential_path)?)?;
    let scanner = Scanner::from_config(config)?;
    let mut session = SessionContext::with_credential(stored.clone());

    scanner.set_remote_collection(&mut session, &FolderRef::parse(folder), None)?;
    let response = scanner.get_item(&mut session, CollectionMode::Remote, item.index);

    match session.credential() {
        Some(current) if *current != stored => {
            fs::write(credential_path, serde_json::to_string_pretty(current)?)?;
            log::info!("refreshed credential written to {}", credential_path.display());
        }
        None => log::warn!("credential is no longer valid; sign in again"),
        _ => {}
    }
    println!("{}", serde_json::to_string_pretty(&presenter.render(&response)?)?);
    Ok(())
}
