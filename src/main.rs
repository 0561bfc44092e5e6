use std::process::ExitCode;

fn main() -> ExitCode {
    match rentledger::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            rentledger::ui::output::error(format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
