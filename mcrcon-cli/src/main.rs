mod config;
mod format;
mod runner;
mod shell;
mod signal;

use crate::config::{Config, Output};
use crate::runner::{run_batch, run_terminal, Chain, Outcome};
use crate::shell::{new_shell, ShellWrite};
use crate::signal::Shutdown;
use clap::Parser;
use crossterm::tty::IsTty;
use log::{debug, error, info, LevelFilter};
use proc_exit::Code;
use rpassword::read_password;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::io::Write;
use std::time::Duration;

const AFTER_HELP: &str = "\
Server address, port and password can be set with the environment variables
MCRCON_HOST, MCRCON_PORT and MCRCON_PASS. Command-line options take precedence.

mcrcon starts in terminal mode if no commands are given.
Commands with spaces must be enclosed in quotes.

Example:
    mcrcon -H my.minecraft.server -p password -w 5 \"say Server is restarting!\" save-all stop";

/// Send rcon commands to a Minecraft server.
#[derive(Parser, Debug)]
#[clap(name = "mcrcon", author, version, about, long_about = None, after_help = AFTER_HELP)]
struct Args {
    /// Server address
    #[clap(short = 'H', long, env = "MCRCON_HOST", default_value = "localhost")]
    host: String,

    /// Port
    #[clap(short = 'P', long, env = "MCRCON_PORT", default_value_t = mcrcon_client::DEFAULT_PORT)]
    port: u16,

    /// Rcon password
    #[clap(short = 'p', long, env = "MCRCON_PASS", hide_env_values = true)]
    password: Option<String>,

    /// Terminal mode
    #[clap(short = 't', long)]
    terminal: bool,

    /// Silent mode, don't print responses
    #[clap(short = 's', long)]
    silent: bool,

    /// Disable colors
    #[clap(short = 'c', long = "no-color")]
    no_color: bool,

    /// Print response bodies as received
    #[clap(short = 'r', long)]
    raw: bool,

    /// Wait between each command (1-600 seconds)
    #[clap(
        short = 'w',
        long,
        value_name = "SECONDS",
        value_parser = clap::value_parser!(u64).range(1..=600)
    )]
    wait: Option<u64>,

    /// Log protocol traffic
    #[clap(long)]
    debug: bool,

    /// Commands to run, in order
    #[clap(value_name = "COMMAND")]
    commands: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ! {
    let args = Args::parse();

    let level = if args.debug {
        LevelFilter::Debug
    } else if args.silent {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    let log_config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .build();
    if let Err(err) = TermLogger::init(level, log_config, TerminalMode::Mixed, ColorChoice::Auto) {
        eprintln!("Could not set up logging: {}", err);
    }

    let config = match into_config(args) {
        Some(config) => config,
        None => Code::FAILURE.process_exit(),
    };

    // Ctrl-C and SIGTERM end the session on the spot, without a goodbye to the server.
    let mut shutdown = Shutdown::new();
    let code = tokio::select! {
        outcome = run(config) => Code::from(outcome),
        () = shutdown.recv() => {
            println!();
            println!("Disconnecting...");
            Code::SUCCESS
        }
    };

    code.process_exit()
}

fn into_config(args: Args) -> Option<Config> {
    let password = match args.password.filter(|pass| !pass.is_empty()) {
        Some(password) => password,
        None if std::io::stdin().is_tty() => prompt_password(&args.host, args.port)?,
        None => {
            eprintln!("You must provide password (-p password).");
            eprintln!("Try 'mcrcon --help' for help.");
            return None;
        }
    };

    Some(Config {
        terminal: args.terminal || args.commands.is_empty(),
        output: Output::new(args.silent, args.no_color, args.raw),
        wait: args.wait.map(Duration::from_secs),
        commands: args.commands,
        host: args.host,
        port: args.port,
        password,
    })
}

fn prompt_password(host: &str, port: u16) -> Option<String> {
    print!("{}:{}'s password: ", host, port);
    if let Err(err) = std::io::stdout().flush() {
        error!("Could not prompt for password: {}", err);
        return None;
    }

    match read_password() {
        Ok(password) => Some(password),
        Err(err) => {
            error!("Could not read password: {}", err);
            None
        }
    }
}

async fn run(config: Config) -> Outcome {
    let client = match mcrcon_client::connect(&config.host, config.port).await {
        Ok(client) => client,
        Err(err) => {
            error!("Connection failed: {}", Chain(&err));
            return Outcome::Failure;
        }
    };

    let mut client = match client.authenticate(&config.password).await {
        Ok(client) => client,
        Err(err) => {
            error!("Authentication failed: {}", Chain(&err));
            return Outcome::Failure;
        }
    };

    let outcome = if config.terminal {
        info!("Logged in. Type 'Q' or press Ctrl-D / Ctrl-C to disconnect.");
        let (mut input, mut shell) = new_shell("> ".to_string());
        run_terminal(&mut client, config.output, &mut input, &mut shell).await
    } else {
        let mut shell = ShellWrite::from_writers(std::io::stdout(), std::io::stderr());
        run_batch(&mut client, &config, &mut shell).await
    };

    if let Err(err) = client.close().await {
        debug!("Error while closing connection: {}", err);
    }

    outcome
}
