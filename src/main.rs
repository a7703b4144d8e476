use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    config_dir: Option<PathBuf>,
    null_audio: bool,
    add_folders: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;

    let paths = gap::config::ConfigPaths::resolve(args.config_dir.as_deref())?;
    paths.ensure_dir()?;
    let _log_guard = gap::logging::init(&paths.log_dir())?;
    tracing::info!(config = %paths.root().display(), "starting");

    gap::app::run_with_startup(
        &paths,
        gap::app::AppStartupOptions {
            null_audio: args.null_audio,
            add_folders: args.add_folders,
        },
    )
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--null-audio" => out.null_audio = true,
            "--config-dir" => {
                index += 1;
                out.config_dir = Some(PathBuf::from(required_value(&args, index, "--config-dir")?));
            }
            "--add" => {
                index += 1;
                out.add_folders
                    .push(PathBuf::from(required_value(&args, index, "--add")?));
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn required_value<'a>(args: &'a [String], index: usize, flag: &str) -> anyhow::Result<&'a str> {
    let Some(value) = args.get(index) else {
        anyhow::bail!("{flag} requires a path");
    };
    let value = value.trim();
    if value.is_empty() {
        anyhow::bail!("{flag} cannot be empty");
    }
    Ok(value)
}

fn print_help() {
    println!("G.A.P - Gabut Audio Player");
    println!("  --config-dir <path>  Settings and playlist directory");
    println!("  --add <folder>       Scan a folder into the playlist on start");
    println!("  --null-audio         Run without an audio output device");
    println!();
    println!("Keys: space play/pause, n/p next/previous, +/- volume, ,/. seek");
    println!("      f files menu, a about, q quit");
}
