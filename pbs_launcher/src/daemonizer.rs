// Copyright 2026 the PBS client authors. MIT license.
//! `Daemonizer`: spawns one thread per configured executable, each of
//! which runs the process and, when `restart` is set, respawns it on
//! exit. Grounded on
//! `cc/process_launcher/daemonizer/src/daemonizer.h`, with one
//! deliberate behavior change from the original: rather than ignoring
//! SIGINT/SIGTERM/SIGHUP for the launcher's own lifetime (the original's
//! `TerminateSignalHandler` swallows them unconditionally), this
//! `Daemonizer` treats any of the three as a request to stop restarting
//! and exit cleanly, matching the expanded CLI surface's "restarts on
//! exit... until the process receives a termination signal" contract.

use std::process::Command;
use std::process::Stdio;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use signal_hook::consts::SIGHUP;
use signal_hook::consts::SIGINT;
use signal_hook::consts::SIGTERM;

use crate::arg_parser::ExecutableArgument;

/// Runs and supervises every configured executable until a termination
/// signal arrives. `run` blocks the calling thread.
pub struct Daemonizer {
  executables: Vec<ExecutableArgument>,
}

impl Daemonizer {
  pub fn new(executables: Vec<ExecutableArgument>) -> Self {
    Daemonizer { executables }
  }

  /// Spawns every executable, restarting those marked `restart` on exit,
  /// until a SIGINT/SIGTERM/SIGHUP is observed. Blocks until every
  /// supervisor thread has wound down.
  pub fn run(self) -> Result<(), std::io::Error> {
    let shutting_down = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM, SIGHUP] {
      signal_hook::flag::register(signal, Arc::clone(&shutting_down))?;
    }

    let handles: Vec<JoinHandle<()>> = self
      .executables
      .into_iter()
      .map(|executable| {
        let shutting_down = Arc::clone(&shutting_down);
        std::thread::spawn(move || supervise(executable, shutting_down))
      })
      .collect();

    for handle in handles {
      let _ = handle.join();
    }
    Ok(())
  }
}

/// Launches `executable` and waits for it to exit. If `restart` is set,
/// loops until `shutting_down` is observed; otherwise returns after the
/// single run.
fn supervise(executable: ExecutableArgument, shutting_down: Arc<AtomicBool>) {
  loop {
    match Command::new(&executable.executable_name)
      .args(&executable.command_line_args)
      .stdin(Stdio::inherit())
      .stdout(Stdio::inherit())
      .stderr(Stdio::inherit())
      .spawn()
    {
      Ok(mut child) => match child.wait() {
        Ok(status) => {
          log::info!(
            "pbs_launcher: {} exited with {status}",
            executable.executable_name
          );
        }
        Err(error) => {
          log::error!(
            "pbs_launcher: failed waiting on {}: {error}",
            executable.executable_name
          );
        }
      },
      Err(error) => {
        log::error!(
          "pbs_launcher: failed to spawn {}: {error}",
          executable.executable_name
        );
      }
    }

    if !executable.restart || shutting_down.load(Ordering::SeqCst) {
      return;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn non_restarting_executable_runs_exactly_once() {
    let shutting_down = Arc::new(AtomicBool::new(false));
    let executable = ExecutableArgument {
      executable_name: "true".to_string(),
      command_line_args: Vec::new(),
      restart: false,
    };
    // Regression guard: a `restart: false` executable must not loop even
    // if it exits instantly and `shutting_down` is never flipped.
    supervise(executable, shutting_down);
  }
}
