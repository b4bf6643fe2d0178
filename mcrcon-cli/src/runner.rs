use crate::config::{is_quit, is_stop, Config, Output};
use crate::format::{write_response, ColorMode};
use crate::shell::{ShellRead, ShellWrite};
use ansi_term::Colour::Red;
use log::{error, warn};
use mcrcon_client::Client;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl From<Outcome> for proc_exit::Code {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => proc_exit::Code::SUCCESS,
            Outcome::Failure => proc_exit::Code::FAILURE,
        }
    }
}

/// Displays an error followed by its sources, `outer: inner: root`.
pub struct Chain<'a>(pub &'a dyn Error);

impl Display for Chain<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {}", err)?;
            source = err.source();
        }
        Ok(())
    }
}

/// Run a fixed list of commands in order, stopping at the first failure.
pub async fn run_batch(client: &mut Client, config: &Config, shell: &mut ShellWrite) -> Outcome {
    let commands = &config.commands;

    for (i, cmd) in commands.iter().enumerate() {
        let body = match client.exec_command(cmd).await {
            Ok(body) => body,
            Err(err) => {
                error!("Command failed: {}", Chain(&err));
                return Outcome::Failure;
            }
        };

        if let Err(err) = show(shell.out(), &body, config.output) {
            error!("Could not write response: {}", err);
            return Outcome::Failure;
        }

        let remaining = commands.len() - i - 1;
        if is_stop(cmd) {
            if remaining > 0 {
                warn!("Skipping {} command(s) after `{}`", remaining, cmd);
            }
            break;
        }

        if remaining > 0 {
            if let Some(wait) = config.wait {
                tokio::time::sleep(wait).await;
            }
        }
    }

    Outcome::Success
}

/// Read commands from the shell until the user quits. Failed commands are reported and the loop
/// goes on.
pub async fn run_terminal(
    client: &mut Client,
    output: Output,
    input: &mut ShellRead,
    shell: &mut ShellWrite,
) -> Outcome {
    loop {
        let line = match input.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                error!("Input error: {}", err);
                return Outcome::Failure;
            }
        };

        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }
        if is_quit(cmd) {
            break;
        }

        let res = match client.exec_command(cmd).await {
            Ok(body) => show(shell.out(), &body, output),
            Err(err) => {
                let label = match output.color {
                    ColorMode::Ansi => Red.paint("Error").to_string(),
                    ColorMode::Strip | ColorMode::Raw => "Error".to_string(),
                };
                writeln!(shell.err(), "{}: {}", label, Chain(&err))
            }
        };
        if let Err(err) = res {
            error!("Could not write to terminal: {}", err);
            return Outcome::Failure;
        }

        if is_stop(cmd) {
            break;
        }
    }

    Outcome::Success
}

fn show(out: &mut dyn Write, body: &[u8], output: Output) -> std::io::Result<()> {
    if output.silent || body.is_empty() {
        return Ok(());
    }
    write_response(out, body, output.color)
}
