use std::{
    io::{ self, BufRead, Write },
    path::{ Path, PathBuf },
    process::ExitCode,
};
use anyhow::{ bail, Context };
use clap::Parser;
use e4990a::{
    config::{ Configuration, CONFIG_FILENAME_DEFAULT, TEMPLATE },
    context::{ self, RunContext },
    device::E4990A,
    resource,
    run,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Keysight E4990A acquisition program
#[derive(Parser)]
#[command(name = "e4990a", version)]
struct Cli
{
    /// Output MAT-file. Prompted for when omitted
    filename: Option<String>,

    /// INI config filename
    #[arg(long = "config", default_value = CONFIG_FILENAME_DEFAULT)]
    config_filename: PathBuf,

    /// Append ISO 8601 datetime to filename
    #[arg(short = 'a', long)]
    append_datetime: bool,

    /// Use default filename (ISO 8601 datetime)
    #[arg(short = 'd', long = "default-filename")]
    use_default_filename: bool,

    /// Print the full error chain and debug logging
    #[arg(long)]
    debug: bool,

    /// Execute fixture compensation procedure
    #[arg(short = 'c', long)]
    fixture_compensation: bool,
}

fn prompt(message: &str) -> io::Result<String>
{
    let mut stdout = io::stdout();
    write!(stdout, "{}", message)?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    Ok(line.trim().to_owned())
}

/// Works out the output file, asking the user where needed
///
/// Returns `None` when the user declines to overwrite an existing file.
fn output_path(cli: &Cli, context: &RunContext) -> io::Result<Option<PathBuf>>
{
    let default_stem = context.default_stem();

    let requested = match &cli.filename {
        Some(filename) => Some(filename.clone()),
        None if cli.use_default_filename => None,
        None => Some(prompt(&format!(
            "Enter a filepath or press [ENTER] to accept the default ({}.{}):",
            default_stem,
            context::DATA_EXTENSION,
        ))?),
    };

    let path = context::resolve_output_path(
        requested.as_deref(),
        &default_stem,
        cli.append_datetime,
        cli.use_default_filename,
    );

    if path.exists() {
        let response = prompt(&format!(
            "File {} exists. Are you sure you want to overwrite it (y/n)?",
            path.display(),
        ))?;
        if !response.eq_ignore_ascii_case("y") {
            return Ok(None);
        }
    }

    Ok(Some(path))
}

async fn execute(cli: &Cli, context: &RunContext) -> anyhow::Result<()>
{
    if !cli.config_filename.exists() {
        if cli.config_filename == Path::new(CONFIG_FILENAME_DEFAULT) {
            println!(
                "Default config file \"{}\" doesn't exist. Creating it from template and exiting.",
                CONFIG_FILENAME_DEFAULT,
            );
            std::fs::write(&cli.config_filename, TEMPLATE)
                .with_context(|| format!("Unable to create {}", CONFIG_FILENAME_DEFAULT))?;
            return Ok(());
        }
        bail!("Config file '{}' not found", cli.config_filename.display());
    }

    let config = Configuration::load(&cli.config_filename)?;

    let output = if cli.fixture_compensation {
        None
    }
    else {
        match output_path(cli, context).context("Unable to read the output filename")? {
            Some(path) => Some(path),
            None => return Ok(()),
        }
    };

    let resource = resource::discover(config.ip_address.as_deref())?;
    info!("Opening resource: {}", resource);
    let device = E4990A::with(resource.open().await?);

    match output {
        Some(output) => {
            run::acquire_to_file(device, &config.sweep, context, &output).await?;
        },
        None => {
            run::run_fixture_compensation(device, &config.sweep, |message| prompt(message).map(|_| ()))
                .await
                .context("Fixture compensation failed")?;
        },
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode
{
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let context = RunContext::capture();

    match execute(&cli, &context).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if cli.debug {
                eprintln!("{:?}", err);
            }
            else {
                eprintln!("\nERROR: {:#}", err);
            }
            ExitCode::FAILURE
        },
    }
}
