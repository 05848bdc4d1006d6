use std::process::ExitCode;

fn main() -> ExitCode {
    amanah_cli::run()
}
