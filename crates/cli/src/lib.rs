// Reconform CLI library - shared by the binary and the integration tests

pub mod exit_codes;
pub mod run;

/// CLI-level error: an exit code plus what to tell the user.
#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}
