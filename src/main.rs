use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use multi_release::config;
use multi_release::error::ReleaseError;
use multi_release::reactor::{Reactor, ReactorOptions};
use multi_release::release::{
    gather_modules, perform_release, ProcessBuildInvoker, ReleaseOptions,
};
use multi_release::ui;

#[derive(clap::Parser)]
#[command(
    name = "multi-release",
    about = "Coordinate versioned releases across multi-module git repositories"
)]
struct Args {
    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<String>,

    #[arg(long, help = "Use this build number instead of allocating the next one")]
    build_number: Option<u64>,

    #[arg(
        short,
        long = "force-release",
        help = "Release this module even if unchanged (repeatable)"
    )]
    force_release: Vec<String>,

    #[arg(
        short = 'm',
        long = "release-module",
        help = "Tag and build only this module; others are decided but not released (repeatable)"
    )]
    release_modules: Vec<String>,

    #[arg(long, help = "Create tags locally but do not push them")]
    no_push: bool,

    #[arg(long, help = "Show what would be released without changing anything")]
    dry_run: bool,

    #[arg(long, help = "Show the configured modules and exit")]
    list: bool,

    #[arg(short, long, help = "Print version information")]
    version: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.version {
        println!("multi-release {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui::display_error(&format!("Error loading config: {}", e));
            std::process::exit(1);
        }
    };

    if args.list {
        println!("Configured modules (build order):");
        for module in &config.modules {
            println!("  - {}", module);
        }
        return Ok(());
    }

    let base_dir = PathBuf::from(".");
    let reactor_opts = ReactorOptions {
        build_number: args.build_number,
        force_release: args.force_release,
        no_changes_action: config.no_changes_action,
        use_build_number: config.use_build_number,
        remote: config.remote.clone(),
    };

    let mut infos = match gather_modules(&config, &base_dir) {
        Ok(infos) => infos,
        Err(e) => exit_with(e),
    };

    if args.dry_run {
        match Reactor::from_modules(&infos, &reactor_opts) {
            Ok(Some(reactor)) => ui::display_decisions(&reactor),
            Ok(None) => ui::display_status("No module changes detected; nothing to release."),
            Err(e) => exit_with(e),
        }
        return Ok(());
    }

    let opts = ReleaseOptions {
        reactor: reactor_opts,
        push_tags: config.push_tags && !args.no_push,
        commit_changes: config.commit_changes,
        base_dir: base_dir.clone(),
        modules_to_release: args.release_modules,
    };
    let invoker = ProcessBuildInvoker::new(config.build_command, config.goals, base_dir);

    match perform_release(&mut infos, &opts, &invoker) {
        Ok(_) => Ok(()),
        Err(e) => exit_with(e),
    }
}

fn exit_with(error: ReleaseError) -> ! {
    match &error {
        ReleaseError::Validation { .. } => ui::display_validation_error(&error),
        _ => ui::display_error(&error.to_string()),
    }
    std::process::exit(1);
}
