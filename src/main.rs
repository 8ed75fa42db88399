mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

use lc_av::{FfmpegTranscoder, ToolRegistry, Transcoder};
use lc_channel::segment_offsets;
use lc_core::config::Config;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting loopcast");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    lc_server::start(config).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "loopcast=trace,lc_channel=trace,lc_server=trace,lc_av=trace,lc_core=debug,tower_http=debug".to_string()
        } else {
            "loopcast=debug,lc_channel=debug,lc_server=debug,lc_av=info,lc_core=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Plan { file } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(plan_file(&file, cli.config.as_deref()))
        }
        Commands::Version => {
            println!("loopcast {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in tools.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. ffmpeg and ffprobe are required to broadcast.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            Config::load(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("Configuration loaded with {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  ! {warning}");
        }
    }

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Library: {}", config.library.root.display());
    println!("  Allowed tags: {}", config.library.allowed_tags.join(", "));
    println!(
        "  Segments: {}s target, {}s minimum, {} per wave",
        config.segmenter.target_duration_secs,
        config.segmenter.min_duration_secs,
        config.segmenter.concurrency()
    );
    println!("  Lookahead: {}", config.prefetch.lookahead);

    Ok(())
}

async fn plan_file(file: &Path, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let transcoder: Arc<dyn Transcoder> =
        Arc::new(FfmpegTranscoder::from_registry(&tools, &config.segmenter)?);

    let duration = transcoder.probe_duration(file).await?;
    let target = config.segmenter.target_duration();
    let offsets = segment_offsets(duration, target, config.segmenter.min_duration());

    println!("File: {}", file.display());
    println!("Duration: {:.3}s", duration.as_secs_f64());
    println!(
        "Segments: {} x {:.3}s (minimum tail {:.3}s)",
        offsets.len(),
        target.as_secs_f64(),
        config.segmenter.min_duration_secs
    );
    for (i, start) in offsets.iter().enumerate() {
        let end = (*start + target).min(duration);
        println!(
            "  [{i}] {:>9.3}s - {:>9.3}s",
            start.as_secs_f64(),
            end.as_secs_f64()
        );
    }
    if offsets.is_empty() {
        println!("  (too short: this file would be skipped)");
    }

    Ok(())
}
