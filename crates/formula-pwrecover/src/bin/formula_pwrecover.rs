use std::process::ExitCode;

fn main() -> ExitCode {
    match formula_pwrecover::cli::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
