use std::process::ExitCode;

fn main() -> ExitCode {
    smartquote_cli::run()
}
