//! Fetch command: sandbox, one fetch, write the payload, report the outcome.

use anyhow::{Context, Result};
use rpdl_core::config::{self, RpdlConfig};
use rpdl_core::outcome::{FetchOutcome, EXIT_INVALID_REQUEST, EXIT_IO_ERROR, EXIT_SUCCESS};
use rpdl_core::output::{self, OutputTarget};
use rpdl_core::request::FetchRequest;
use rpdl_core::sandbox::{OsSandbox, SandboxProfile};
use rpdl_core::transport::PlatformTransport;
use rpdl_core::worker::run_worker;

use crate::cli::FetchArgs;

/// Merges CLI arguments over config values.
pub(crate) fn build_request(args: &FetchArgs, cfg: &RpdlConfig) -> Result<FetchRequest> {
    let user_agent = args.user_agent.as_deref().unwrap_or(&cfg.user_agent);
    let max_size = args.max_size.unwrap_or(cfg.max_size);
    FetchRequest::new(args.url.as_str(), user_agent, max_size)
        .with_context(|| format!("invalid request for {}", args.url))
}

pub(crate) fn output_target(args: &FetchArgs) -> OutputTarget {
    match &args.output {
        Some(path) => OutputTarget::File(path.clone()),
        None => OutputTarget::Stdout,
    }
}

pub fn run_fetch(args: &FetchArgs) -> u8 {
    let (cfg, request) = match config::load().and_then(|cfg| {
        let request = build_request(args, &cfg)?;
        Ok((cfg, request))
    }) {
        Ok(prepared) => prepared,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("rp-download: {:#}", err);
            return EXIT_INVALID_REQUEST;
        }
    };
    let target = output_target(args);
    tracing::debug!(url = request.url(), max_size = request.max_size(), ?target, "fetch requested");

    let outcome = match run_worker(
        &OsSandbox::process(),
        &SandboxProfile::for_current_platform(),
        || PlatformTransport::new(cfg.curl_options()),
        &request,
    ) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("rp-download: {}", err);
            return err.exit_code();
        }
    };

    match outcome {
        FetchOutcome::Success(result) => {
            if let Some(mtime) = result.mtime {
                tracing::info!(mtime, "resource last modified");
            }
            match output::write_result(&result, &target) {
                Ok(()) => EXIT_SUCCESS,
                Err(err) => {
                    tracing::error!(error = %err, "failed to deliver payload");
                    eprintln!("rp-download: {}", err);
                    EXIT_IO_ERROR
                }
            }
        }
        other => {
            eprintln!("rp-download: {}: {}", request.url(), other);
            other.exit_code()
        }
    }
}
