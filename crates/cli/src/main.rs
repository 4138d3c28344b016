use std::process::ExitCode;

fn main() -> ExitCode {
    epicerie_cli::run()
}
