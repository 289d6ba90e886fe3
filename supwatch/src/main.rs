use std::fs::File;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use supwatch::{Cli, Cmd, get_config, run};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match get_config(&cli).await {
        Ok(c) => c,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };

    let interactive = matches!(cli.command, None | Some(Cmd::Watch));
    install_tracing(&config.log, interactive);

    if let Err(error) = run(cli, config).await {
        tracing::error!("{error}");
        eprintln!("{error}");
        std::process::exit(1);
    }
}

/// One-shot commands log to stderr. The dashboard owns the terminal, so its
/// logs go to a file in the temp dir instead.
pub fn install_tracing(level: &str, interactive: bool) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    if interactive {
        let path = std::env::temp_dir().join("supwatch.log");
        let Ok(file) = File::create(&path) else {
            // better no logs than logs scribbled over the alternate screen
            return;
        };
        fmt()
            .with_env_filter(filter)
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
            .init();
    }
}
