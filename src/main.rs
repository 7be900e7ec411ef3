use clap::Parser;
use mpf_processor::cli::{args::Args, commands};
use std::process;

fn main() {
    let args = Args::parse();

    match commands::run(args) {
        Ok(()) => process::exit(0),
        Err(error) => {
            // Error occurred - print the whole context chain to stderr
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}
