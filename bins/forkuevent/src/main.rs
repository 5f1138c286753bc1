//! forkuevent command - inject a uevent into a process's network namespace.
//!
//! Spawned once per uevent by the container manager. Exits 0 on success and
//! 1 on any failure, with a one-line diagnostic on stderr.

use std::ffi::OsString;
use std::os::unix::ffi::OsStrExt;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use uevent_inject::{InjectOptions, InjectRequest, Injector, LinuxPlatform};

#[derive(Parser, Debug)]
#[command(
    name = "forkuevent",
    version,
    about = "Inject a uevent into a process's network namespace",
    allow_negative_numbers = true
)]
struct Cli {
    /// Wait for the kernel to acknowledge the uevent.
    #[arg(long)]
    ack: bool,

    /// Give up waiting for the acknowledgement after this many milliseconds.
    #[arg(long, value_name = "MS", requires = "ack")]
    ack_timeout: Option<u64>,

    /// Target process id.
    #[arg(value_parser = clap::value_parser!(i32).range(1..))]
    pid: i32,

    /// Open pidfd for the target process, or -1 if none is available.
    #[arg(value_parser = clap::value_parser!(i32).range(-1..))]
    pidfd: i32,

    /// Payload length in bytes, counting one NUL terminator per token.
    length: usize,

    /// Uevent entries (KEY=VALUE), sent NUL-terminated in order.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    uevent: Vec<OsString>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too and are not failures.
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Initialize tracing; stdout stays silent. RUST_LOG replaces the
    // default `warn` filter rather than being capped by it.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        let code = e
            .downcast_ref::<uevent_inject::Error>()
            .map_or(1, uevent_inject::Error::exit_code);
        return ExitCode::from(code);
    }

    ExitCode::SUCCESS
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let request = InjectRequest::new(
        cli.pid,
        cli.pidfd,
        cli.length,
        cli.uevent.iter().map(|token| token.as_bytes()),
    )?;

    let mut options = InjectOptions::new().ack(cli.ack);
    if let Some(ms) = cli.ack_timeout {
        options = options.ack_timeout(Duration::from_millis(ms));
    }

    // setns() only moves the calling thread, so the socket must be created
    // on the same thread: no worker pool.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow::anyhow!("cannot start runtime: {}", e))?;

    let mut injector = Injector::new(LinuxPlatform, options);
    runtime.block_on(injector.run(&request))?;

    Ok(())
}
