use std::process::ExitCode;

fn main() -> ExitCode {
    prodscore_cli::run()
}
