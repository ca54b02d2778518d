// Copyright 2026 the PBS client authors. MIT license.
//! Process launcher binary: the workspace's one runnable entry point.
//! Reads one JSON argument blob per CLI argument, describing a child
//! process to launch and supervise. Grounded on
//! `cc/process_launcher/launcher.cc`.

mod arg_parser;
mod daemonizer;

use std::process::ExitCode;

use arg_parser::parse_executable_argument;
use daemonizer::Daemonizer;

fn main() -> ExitCode {
  env_logger::init();

  let args: Vec<String> = std::env::args().skip(1).collect();
  if args.is_empty() {
    log::error!("pbs_launcher: must provide at least one executable argument blob");
    return ExitCode::FAILURE;
  }

  let mut executables = Vec::with_capacity(args.len());
  for arg in &args {
    match parse_executable_argument(arg) {
      Ok(executable) => executables.push(executable),
      Err(error) => {
        log::error!("pbs_launcher: {error}");
        return ExitCode::FAILURE;
      }
    }
  }

  if let Err(error) = Daemonizer::new(executables).run() {
    log::error!("pbs_launcher: {error}");
    return ExitCode::FAILURE;
  }

  log::info!("pbs_launcher: exiting");
  ExitCode::SUCCESS
}
