//! Backdrop installer CLI entrypoint.
//!
//! This binary lists published Backdrop CMS releases, downloads one into a
//! local cache, and merges it into an installation without overwriting site
//! content.

use backdrop_installer::artefact::download::HttpDownloader;
use backdrop_installer::artefact::extraction::ZipExtractor;
use backdrop_installer::cli::Cli;
use backdrop_installer::commands::{Context, RunOutcome, run as run_command};
use backdrop_installer::config::InstallerConfig;
use backdrop_installer::dirs::SystemBaseDirs;
use backdrop_installer::error::Result;
use backdrop_installer::output::write_stderr_line;
use backdrop_installer::prompt::TerminalPrompter;
use backdrop_installer::scratch::ScratchDir;
use clap::Parser;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<RunOutcome> {
    let dirs = SystemBaseDirs;
    let config = InstallerConfig::load(cli.config.as_deref(), &dirs)?;
    let scratch = ScratchDir::new(config.scratch_root(&dirs)?);
    log::debug!("using scratch directory {}", scratch.root());

    let downloader = HttpDownloader::new(config.timeout());
    let context = Context {
        config: &config,
        downloader: &downloader,
        prompter: &TerminalPrompter,
        extractor: &ZipExtractor,
        scratch: &scratch,
        quiet: cli.quiet,
    };
    run_command(&context, &cli.command, stdout, stderr)
}

/// A declined confirmation is a clean exit, not a failure.
fn exit_code_for_run_result(result: Result<RunOutcome>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(RunOutcome::Completed | RunOutcome::Aborted) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backdrop_installer::error::InstallerError;
    use rstest::rstest;

    #[rstest]
    #[case::completed(RunOutcome::Completed)]
    #[case::aborted(RunOutcome::Aborted)]
    fn exit_code_for_run_result_returns_zero_without_error(#[case] outcome: RunOutcome) {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(outcome), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = InstallerError::UnknownVersion {
            version: "9.9.9".to_owned(),
        };

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("version 9.9.9 not available"));
    }

    #[test]
    fn missing_explicit_config_fails_before_any_network_access() {
        let temp = tempfile::tempdir().expect("temp dir");
        let missing = temp.path().join("absent.toml");
        let cli = Cli::parse_from([
            "backdrop-installer",
            "--config",
            missing.to_str().expect("UTF-8 path"),
            "list",
        ]);

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let err = run(&cli, &mut stdout, &mut stderr).expect_err("config must be missing");
        assert!(matches!(err, InstallerError::Config(_)));
        assert!(stdout.is_empty());
    }
}
