//! agent-desktop launcher: runs the native executable for this platform.

use std::process::ExitCode;

use shim_core::Launcher;
use shim_core::launch::FAILURE_EXIT_CODE;

fn main() -> ExitCode {
    shim_cli::init_tracing();

    let config = match shim_cli::launch_config(|k| std::env::var(k).ok()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return exit_code(FAILURE_EXIT_CODE);
        }
    };

    match Launcher::new(config).launch(std::env::args_os().skip(1)) {
        Ok(code) => exit_code(code),
        Err(e) => {
            eprintln!("Error: {e}");
            for line in e.fix_suggestion() {
                eprintln!("{line}");
            }
            exit_code(FAILURE_EXIT_CODE)
        }
    }
}

/// Child exit codes outside `0..=255` are truncated the same way the OS does.
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from((code & 0xff) as u8)
}
