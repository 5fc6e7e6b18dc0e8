//! Process recycling: start a fresh copy of this program with the same
//! arguments once the service's context budget is spent.

use std::env;
use std::io;
use std::process::Command;

fn same_invocation() -> io::Result<Command> {
    let mut command = Command::new(env::current_exe()?);
    command.args(env::args_os().skip(1));
    Ok(command)
}

/// Replace the current process image. Returns only on failure.
#[cfg(unix)]
pub fn restart() -> io::Result<i32> {
    use std::os::unix::process::CommandExt;

    let err = same_invocation()?.exec();
    Err(err)
}

/// Run a fresh copy on the inherited stdio and wait for it.
#[cfg(not(unix))]
pub fn restart() -> io::Result<i32> {
    let status = same_invocation()?.status()?;
    Ok(status.code().unwrap_or(crate::EXIT_SOFTWARE))
}
