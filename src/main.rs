use std::process::ExitCode;

fn main() -> ExitCode {
    pydevelop_docs::cli::run()
}
