/*!
 * Mountwatch - Main Entry Point
 *
 * Reports filesystems as they are mounted and unmounted:
 * - Startup table dump
 * - MOUNTED / UNMOUNTED lines on stdout
 * - Graceful shutdown on Ctrl-C or SIGTERM; a second signal exits at once
 *
 * Exit codes: 0 after a graceful shutdown, 1 on setup failure or a fatal
 * backend error.
 */

use std::process::ExitCode;
use tracing::{error, info, warn};

use mountwatch::{
    init_tracing, platform_name, render, telemetry::log_startup, Backend, EventSource, Monitor,
    MonitorConfig, MonitorHandle, OutputFormat, SetupError, SystemTable,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match MonitorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(SetupError::from(e)));
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.trace_json);
    let text = config.format == OutputFormat::Text;

    if text {
        println!("Filesystem Mount Detector");
        println!("========================");
    }
    let Some(platform) = platform_name(std::env::consts::OS) else {
        error!(os = std::env::consts::OS, "unsupported operating system");
        eprintln!(
            "{:?}",
            miette::Report::new(SetupError::Unsupported(std::env::consts::OS.to_string()))
        );
        return ExitCode::FAILURE;
    };
    if text {
        println!("Running on {}\n", platform);
    }

    let table = SystemTable::detect(config.table_path.clone());
    let backend = match Backend::open(config.backend, &config.watch_paths()) {
        Ok(backend) => backend,
        Err(e) => {
            error!(error = %e, "failed to register notification backend");
            eprintln!("{:?}", miette::Report::new(e));
            return ExitCode::FAILURE;
        }
    };
    log_startup(platform, backend.name(), table.name());

    let monitor = match Monitor::start(backend, table) {
        Ok(monitor) => monitor.with_timeout(config.wait_timeout()),
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            return ExitCode::FAILURE;
        }
    };

    if text {
        println!("Monitoring filesystem mounts on {}...", platform);
    }

    let handle = match MonitorHandle::spawn(monitor) {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "failed to spawn monitor thread");
            return ExitCode::FAILURE;
        }
    };

    let stop = handle.stop_flag();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, stopping after the current wait");
        stop.request();

        // With no wait timeout the loop may never wake on an idle host
        shutdown_signal().await;
        warn!("second shutdown signal received, exiting immediately");
        std::process::exit(1);
    });

    let reports = handle.reports();
    while let Ok(report) = reports.recv_async().await {
        println!("{}", render(&report, config.format));
    }

    match tokio::task::spawn_blocking(move || handle.join()).await {
        Ok(Ok(stats)) => {
            info!(
                wakes = stats.wakes,
                mounted = stats.mounted,
                unmounted = stats.unmounted,
                "mountwatch stopped"
            );
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "monitor join task failed");
            ExitCode::FAILURE
        }
    }
}

/// Resolves on the next Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
