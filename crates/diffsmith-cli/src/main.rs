use diffsmith_cli::{cli, commands, logging};
use std::path::PathBuf;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let matches = cli::command().get_matches();
    let config = cli::resolve_config(&matches)?;
    logging::init(&config.logging);

    let status = match matches.subcommand() {
        Some(("run", args)) => {
            let request = args.get_one::<String>("request").map_or("", String::as_str);
            commands::run(&config, request, args.get_flag("pretty")).await?
        }
        Some(("decompose", args)) => {
            let request = args.get_one::<String>("request").map_or("", String::as_str);
            commands::decompose(&config, request).await?
        }
        Some(("check", args)) => {
            let category = args.get_one::<String>("category").map_or("structure", String::as_str);
            let diff = args.get_one::<PathBuf>("diff").cloned().unwrap_or_default();
            commands::check(&config, category, &diff).await?
        }
        _ => commands::EXIT_OK,
    };

    Ok(ExitCode::from(status))
}
