use colored::Colorize;

/// Transient user-facing success/error messages. The console backend
/// stands in for the toast widget of the web client.
pub trait Notify {
    fn success(&mut self, message: &str);
    fn error(&mut self, message: &str);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleNotify;

impl Notify for ConsoleNotify {
    fn success(&mut self, message: &str) {
        println!(
            "{}{}{} {}",
            "[".bold().white(),
            "OK".bold().green(),
            "]".bold().white(),
            message
        );
    }

    fn error(&mut self, message: &str) {
        eprintln!(
            "{}{}{} {}",
            "[".bold().white(),
            "ERR".bold().red(),
            "]".bold().white(),
            message
        );
    }
}

/// Records notifications instead of printing them.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotify {
    pub successes: Vec<String>,
    pub errors: Vec<String>,
}

impl Notify for RecordingNotify {
    fn success(&mut self, message: &str) {
        self.successes.push(message.to_string());
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}
