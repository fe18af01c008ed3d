// Backs up or removes a model from a local ollama model store.
//
// A model is its manifest plus every blob the manifest references. Backup
// zips them up with paths relative to the store root, so the archive can be
// unpacked straight into another machine's store. Removal deletes the same
// set of files.
//
// Blobs shared with other models are removed as well, nothing checks for
// other manifests pointing at them.
#[macro_use]
extern crate log;
use serde::Deserialize;
use std::path::PathBuf;

mod archive;
mod error;
mod manifest;
mod remove;
mod store;

use error::Result;
use store::ModelRef;

/// Output argument that switches from backup to removal.
const REMOVE_MODE: &str = "rm";

const USAGE: &str = "
Usage:
    modelbak [options] [<model> [<output>]]
    modelbak (-h | --help)

Backs up <model> to <output>/<name>-<version>.zip (default: current
directory), or deletes its files when <output> is `rm`.

Examples:
    modelbak deepseek-r1:1.5b
    modelbak deepseek-r1:1.5b D:/models
    modelbak lrs33/bce-embedding-base_v1:latest
    modelbak deepseek-r1:1.5b rm

Options:
    -h --help          Show this screen.
    --models DIR       Model store root, overrides OLLAMA_MODELS.
    --registry HOST    Registry directory under manifests/ [default: registry.ollama.ai].
";

#[derive(Deserialize, Debug)]
struct Args {
    arg_model: Option<String>,
    arg_output: Option<String>,
    flag_models: Option<String>,
    flag_registry: String,
}

#[derive(Debug)]
struct Config {
    /// Store root holding manifests/ and blobs/.
    model_root: PathBuf,
    /// Registry host directory, e.g. registry.ollama.ai
    registry: String,
}

#[derive(Debug, PartialEq)]
enum Command {
    Backup { output_dir: PathBuf },
    Remove,
}

impl Command {
    fn from_output(output: Option<&str>) -> Command {
        match output {
            Some(REMOVE_MODE) => Command::Remove,
            Some(dir) => Command::Backup {
                output_dir: PathBuf::from(dir),
            },
            None => Command::Backup {
                output_dir: PathBuf::from("."),
            },
        }
    }
}

/// Resolves the model's files and backs them up or removes them.
/// Removal failures are logged per file and don't fail the run.
fn run(config: &Config, model: &ModelRef, command: &Command) -> Result<()> {
    let manifest_path = model.manifest_path(&config.model_root, &config.registry);
    info!("manifest for {}: {}", model, manifest_path.display());

    let mut paths = manifest::resolve(&manifest_path, &config.model_root)?;
    paths.push(manifest_path);

    match command {
        Command::Backup { output_dir } => {
            archive::archive(&model.archive_name(), output_dir, &paths, &config.model_root)?;
        }
        Command::Remove => {
            let removal = remove::remove(&paths);
            info!("removed {} files of {}", removal.removed.len(), model);
            if !removal.failed.is_empty() {
                warn!(
                    "{} of {} files of {} could not be removed",
                    removal.failed.len(),
                    paths.len(),
                    model
                );
            }
        }
    }
    Ok(())
}

fn try_main(args: Args) -> Result<()> {
    let model = match &args.arg_model {
        Some(model) => ModelRef::parse(model)?,
        None => {
            println!("{}", USAGE.trim());
            return Ok(());
        }
    };
    let config = Config {
        model_root: store::locate_root(args.flag_models.as_ref().map(std::path::Path::new))?,
        registry: args.flag_registry,
    };
    info!("model store: {}", config.model_root.display());

    run(&config, &model, &Command::from_output(args.arg_output.as_deref()))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Args = docopt::Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    if let Err(err) = try_main(args) {
        error!("{}", err);
        std::process::exit(1);
    }
}
