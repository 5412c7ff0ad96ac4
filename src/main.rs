mod cli;

use std::path::Path;
use std::sync::Arc;

use abr_av::ToolRegistry;
use abr_core::config::{self, DEFAULT_PROFILE};
use abr_core::{Config, EventBus};
use abr_pack::{spawn_listener, CatalogItem};
use abrhls::library::LibraryCatalog;
use abrhls::server::{self, AppState};
use abrhls::{build_library, build_packager, watch};
use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise defaults based on the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "abrhls=trace,abr_pack=trace,abr_av=trace,abr_core=debug,tower_http=debug".to_string()
        } else {
            "abrhls=debug,abr_pack=debug,abr_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(config_path, host, port))
        }
        Commands::Pack { target, profile } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(pack(config_path, &target, &profile))
        }
        Commands::Plan {
            target,
            profile,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(plan(config_path, &target, &profile, json))
        }
        Commands::Levels { target, profile } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(levels(config_path, &target, &profile))
        }
        Commands::CheckTools => check_tools(config_path),
        Commands::Validate {
            config: validate_path,
        } => validate_config(validate_path.as_deref().or(config_path)),
        Commands::Version => {
            println!("abrhls {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Config, tools, and a catalog over the configured library.
struct Setup {
    config: Arc<Config>,
    tools: ToolRegistry,
    library: Arc<LibraryCatalog>,
}

fn setup(config_path: Option<&Path>) -> Result<Setup> {
    let config = Arc::new(config::load_config_or_default(config_path)?);
    let tools = ToolRegistry::discover(&config.tools);
    let library = Arc::new(build_library(&config, &tools));
    Ok(Setup {
        config,
        tools,
        library,
    })
}

/// Find `target` (a path or an item id) in the library.
fn resolve(setup: &Setup, target: &str) -> Result<CatalogItem> {
    if let Some(item) = setup.library.resolve(target) {
        return Ok(item);
    }
    // Ids are only known after a scan.
    setup.library.scan(&setup.config.library.roots);
    setup
        .library
        .resolve(target)
        .with_context(|| format!("No such file or library item: {target}"))
}

async fn serve(config_path: Option<&Path>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;
    let config = Arc::new(config);

    tracing::info!("Starting abrhls");

    let tools = ToolRegistry::discover(&config.tools);
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }

    let library = Arc::new(build_library(&config, &tools));
    let scan_library = library.clone();
    let roots = config.library.roots.clone();
    let found = tokio::task::spawn_blocking(move || scan_library.scan(&roots))
        .await
        .context("Library scan task failed")?;
    tracing::info!("Library scan found {} items", found);

    let packager = build_packager(config.clone(), library.clone(), &tools);
    let shutdown = CancellationToken::new();
    let bus = EventBus::new();

    let listener = config.library.auto_pack.then(|| {
        spawn_listener(
            packager.clone(),
            bus.subscribe(),
            DEFAULT_PROFILE.to_string(),
            config.packaging.max_concurrent_jobs,
            shutdown.clone(),
        )
    });
    let watcher = tokio::spawn(watch::run_watcher(
        config.clone(),
        library,
        bus,
        shutdown.clone(),
    ));

    let result = server::start_server(AppState::new(packager, shutdown.clone())).await;

    tracing::info!("Shutting down...");
    shutdown.cancel();
    match watcher.await {
        Ok(Err(e)) => tracing::warn!("Library watcher error: {:#}", e),
        Err(e) => tracing::warn!("Library watcher task failed: {}", e),
        Ok(Ok(())) => {}
    }
    if let Some(listener) = listener {
        let _ = listener.await;
    }

    result
}

async fn pack(config_path: Option<&Path>, target: &str, profile: &str) -> Result<()> {
    let setup = setup(config_path)?;
    let item = resolve(&setup, target)?;
    let packager = build_packager(setup.config.clone(), setup.library.clone(), &setup.tools);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    println!("Packaging {} ({}) with '{}'...", item.name, item.id, profile);
    let out_dir = packager
        .try_ensure_packed(item.id, profile, cancel)
        .await
        .with_context(|| format!("Packaging {} failed", item.name))?;

    println!("Ready: {}", abr_pack::paths::master_playlist(&out_dir).display());
    Ok(())
}

async fn plan(config_path: Option<&Path>, target: &str, profile: &str, json: bool) -> Result<()> {
    let setup = setup(config_path)?;
    let item = resolve(&setup, target)?;
    let packager = build_packager(setup.config.clone(), setup.library.clone(), &setup.tools);

    let job = packager.prepare(item.id, profile).await?;
    let args = abr_pack::args::to_args(&job.spec);

    if json {
        let out = serde_json::json!({
            "item_id": item.id,
            "profile": profile,
            "source_height": job.source.height,
            "output_dir": job.spec.output_dir,
            "renditions": job.spec.rendition_names().collect::<Vec<_>>(),
            "args": args,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Item: {} ({})", item.name, item.id);
    println!(
        "Source: {}p, audio {}",
        job.source.height,
        job.source.audio_codec.as_deref().unwrap_or("none")
    );
    println!("Output: {}", job.spec.output_dir.display());
    println!("\nRenditions: {}", job.plan.len());
    for rendition in &job.plan {
        print!("  [{}] {}", rendition.index, rendition.name());
        if rendition.profile.height > 0 {
            print!(" {}x{}", rendition.profile.width, rendition.profile.height);
        }
        match &rendition.audio {
            Some(audio) => println!(" audio={:?}", audio),
            None => println!(" (no audio)"),
        }
    }
    println!("\nffmpeg {}", args.join(" "));
    Ok(())
}

async fn levels(config_path: Option<&Path>, target: &str, profile: &str) -> Result<()> {
    let setup = setup(config_path)?;
    let item = resolve(&setup, target)?;
    let packager = build_packager(setup.config.clone(), setup.library.clone(), &setup.tools);

    let levels = packager.levels(item.id, profile).await?;
    if levels.is_empty() {
        println!("No renditions packaged for {} with '{}'", item.name, profile);
        return Ok(());
    }
    for level in levels {
        if level.audio_only {
            println!("{:<10} audio {} bps", level.name, level.bitrate);
        } else {
            println!(
                "{:<10} {}x{} {} bps (max {})",
                level.name, level.width, level.height, level.bitrate, level.max_bitrate
            );
        }
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
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
        println!("Some tools are missing. Packaging needs ffmpeg and ffprobe.");
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Output root: {}", config.output_root().display());
    println!(
        "  Colocate with source: {}",
        config.packaging.colocate_with_source
    );
    println!("  Library roots: {}", config.library.roots.len());
    println!("  Watch enabled: {}", config.library.watch);
    println!("  Ladders:");
    for (name, ladder) in &config.ladders {
        let names: Vec<&str> = ladder.profiles.iter().map(|p| p.name.as_str()).collect();
        println!("    {} [{}]", name, names.join(", "));
    }
    Ok(())
}
