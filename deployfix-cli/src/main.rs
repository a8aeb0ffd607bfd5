mod logging;

use camino::Utf8PathBuf;
use clap::Parser;
use deployfix_core::{BundleFixer, FsBundleFs, InspectPolicy, ShellToolPort};
use deployfix_domain::BundleContext;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "deployfix",
    version,
    about = "Finish the job started by macdeployqt.",
    long_about = "Finish the job started by macdeployqt:\n\
                  - find dependencies and loader paths with otool\n\
                  - copy missed dependencies into the bundle\n\
                  - fix stale loader paths with install_name_tool\n\n\
                  Exit codes: 0 on success, 1 on error."
)]
struct Cli {
    /// Path to the main binary inside the bundle that depends on Qt.
    exe_path: Utf8PathBuf,

    /// Path of the Qt libraries used to build the application.
    qt_path: Utf8PathBuf,

    /// Do not log to standard output.
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Do not create the './deployfix.log' log file.
    #[arg(long, default_value_t = false)]
    no_log_file: bool,

    /// Produce more log messages (debug log).
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Treat a failing dependency inspection as an error instead of an empty
    /// dependency list.
    #[arg(long, default_value_t = false)]
    strict_inspect: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.quiet, cli.no_log_file, cli.verbose) {
        eprintln!("deployfix: {e:#}");
        return ExitCode::from(1);
    }

    if let Err(e) = run(&cli) {
        error!("{e:?}");
        error!("process terminated with error");
        return ExitCode::from(1);
    }
    info!("process terminated with success");
    ExitCode::from(0)
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let ctx = BundleContext::new(cli.exe_path.clone(), cli.qt_path.clone())?;
    let tools = ShellToolPort;
    let fs = FsBundleFs;
    let policy = if cli.strict_inspect {
        InspectPolicy::Strict
    } else {
        InspectPolicy::Lenient
    };

    BundleFixer::new(&ctx, &tools, &fs)
        .with_inspect_policy(policy)
        .fix_bundle()
}
