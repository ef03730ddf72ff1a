// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Ultralytics Overlay CLI.

mod cli;

use std::process;

use clap::Parser;

use cli::args::Cli;
use cli::run::run_overlay;
use ultralytics_overlay::error;
use ultralytics_overlay::logging::set_verbose;

fn main() {
    let cli = Cli::parse();
    let (task, args) = cli.command.split();
    set_verbose(args.verbose);

    if let Err(e) = run_overlay(task, args) {
        error!("{e}");
        process::exit(1);
    }
}
