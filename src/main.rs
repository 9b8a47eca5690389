use std::process::exit;

use colored::Colorize;

fn main() {
    if let Err(message) = asphaleia::app::run_cli() {
        if !message.is_empty() {
            eprintln!(
                "{}{}{} {}",
                "[".bold().white(),
                "ERR".bold().red(),
                "]".bold().white(),
                message
            );
        }
        exit(1);
    }
}
