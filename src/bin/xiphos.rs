//! Xiphos CLI binary.

use std::io::Write;
use std::process;

use clap::Parser;
use env_logger::Builder;

use xiphos::cli::{args::XiphosArgs, commands::execute_command};

fn main() {
    // Parse command line arguments using clap
    let args = XiphosArgs::parse();

    // Set up logging/verbosity based on args
    Builder::new()
        .filter_level(args.log_level())
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    // Execute the command
    if let Err(e) = execute_command(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
