mod commands;

use anyhow::Result;
use clap::Parser;
use commands::Cli;
use std::io::Write;
use volume_controller::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(logging::level_for_verbosity(cli.verbose));

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    platform_main(&cli, &mut out)
}

#[cfg(windows)]
fn platform_main(cli: &Cli, out: &mut impl Write) -> Result<()> {
    use volume_controller::audio::com::{ComGuard, ComPlatform};

    let _com = ComGuard::new()?;
    commands::run(cli, ComPlatform, out)
}

#[cfg(not(windows))]
fn platform_main(_cli: &Cli, _out: &mut impl Write) -> Result<()> {
    anyhow::bail!("pcvol needs Windows Core Audio and only runs on Windows")
}
