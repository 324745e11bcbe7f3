//! bundled-pydev CLI entry point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use bundled_pydev::{
    install_headers, install_module, unpack_headers_with_progress, ArchiveHandle, HeaderStage,
    InstalledHeaderSet, InterpreterFamily, ProvisionError, ProvisionOptions, ProvisionProgress,
};
use clap::{Args, Parser, Subcommand};
use dialoguer::Input;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Provision development files for the interpreter bundled in a host application.
#[derive(Debug, Parser)]
#[command(name = "bundled-pydev")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Host application executable (a bare name is looked up on PATH)
    #[arg(long, global = true, env = "BUNDLED_PYDEV_HOST", default_value = "blender")]
    host: PathBuf,

    /// Interpreter family bundled by the host
    #[arg(long, global = true, default_value = "python")]
    family: InterpreterFamily,

    /// Seconds to wait for the host and interpreter probes
    #[arg(long, global = true, default_value_t = 60)]
    process_timeout: u64,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install C headers matching the bundled interpreter
    Headers(HeadersArgs),

    /// Install a package into the bundled interpreter
    Module(ModuleArgs),
}

#[derive(Debug, Args)]
struct HeadersArgs {
    /// Base URL of the source release server
    #[arg(long, env = "BUNDLED_PYDEV_RELEASE_URL")]
    release_url: Option<String>,

    /// Use an already downloaded release archive instead of fetching one
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Directory for downloads and extraction scratch space
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Seconds to wait for each network operation
    #[arg(long, default_value_t = 30)]
    network_timeout: u64,
}

#[derive(Debug, Args)]
struct ModuleArgs {
    /// Package to install, e.g. `numpy` or `requests==2.31.0` (prompted for when omitted)
    package: Option<String>,

    /// Seconds to wait for the package manager
    #[arg(long, default_value_t = 300)]
    install_timeout: u64,
}

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("bundled_pydev=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bundled_pydev=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Turn a bare host name into a full path via PATH; paths are used as given.
fn resolve_host(host: &Path) -> Result<PathBuf, String> {
    if host.components().count() > 1 || host.is_absolute() {
        return Ok(host.to_path_buf());
    }
    which::which(host).map_err(|e| {
        format!(
            "could not find `{}` on PATH ({}); pass --host with the full path to the executable",
            host.display(),
            e
        )
    })
}

fn print_progress(progress: ProvisionProgress) {
    println!("{}", progress);
}

fn report(error: &ProvisionError) -> ExitCode {
    eprintln!("Error: {}", error);
    eprintln!("{}", error.fix_suggestion());
    ExitCode::from(1)
}

/// Header pipeline that stops at the fetch stage and unpacks a local archive.
async fn install_headers_offline(
    host: &Path,
    archive: &Path,
    options: &ProvisionOptions,
) -> Result<InstalledHeaderSet, ProvisionError> {
    let archive = ArchiveHandle::local(archive)?;
    let mut stage = HeaderStage::Locate;
    let (location, version) = loop {
        stage = match stage.advance(host, options, &print_progress).await? {
            HeaderStage::Fetch { location, version } => break (location, version),
            next => next,
        };
    };

    let installed =
        unpack_headers_with_progress(&archive, &location, &version, options, print_progress)
            .await?;
    print_progress(ProvisionProgress::HeadersInstalled {
        destination: installed.path.clone(),
    });
    Ok(installed)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("bundled-pydev starting with args: {:?}", cli);

    let host = match resolve_host(&cli.host) {
        Ok(host) => host,
        Err(message) => {
            eprintln!("Error: {}", message);
            return ExitCode::from(2);
        }
    };

    let mut options = ProvisionOptions {
        family: cli.family,
        process_timeout: Duration::from_secs(cli.process_timeout),
        ..Default::default()
    };

    match cli.command {
        Commands::Headers(args) => {
            options.release_base_url = args.release_url;
            options.scratch_dir = args.scratch_dir;
            options.network_timeout = Duration::from_secs(args.network_timeout);

            let result = match &args.archive {
                Some(archive) => install_headers_offline(&host, archive, &options).await,
                None => install_headers(&host, &options, print_progress).await,
            };
            match result {
                Ok(headers) => {
                    println!(
                        "{} header files for {} {} in {}",
                        headers.file_count,
                        options.family.display_name(),
                        headers.version,
                        headers.path.display()
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => report(&e),
            }
        }
        Commands::Module(args) => {
            options.install_timeout = Duration::from_secs(args.install_timeout);

            let package = match args.package {
                Some(package) => package,
                None => match Input::<String>::new()
                    .with_prompt("External module to install")
                    .interact_text()
                {
                    Ok(package) => package,
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return ExitCode::from(2);
                    }
                },
            };

            match install_module(&host, &package, &options, print_progress).await {
                Ok(module) => {
                    if !module.output.trim().is_empty() {
                        println!("{}", module.output.trim_end());
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => report(&e),
            }
        }
    }
}
