use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::commands::{AuthCommand, ConfigureCommand, ExchangeArgs, ProcessCommand};
use crate::error::Error;

/// Exit status for a failed run that the user can fix in flags or config
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// Exit status for any other failure
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "awscompat",
    version,
    about = "Exchange Google OIDC ID tokens for temporary AWS credentials",
    long_about = None
)]
pub struct Cli {
    #[arg(
        short = 'p',
        long,
        global = true,
        default_value = "default",
        help = "Profile name"
    )]
    pub profile: String,

    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[command(flatten)]
    pub exchange: ExchangeArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Print AWS credential_process JSON (default)")]
    Process(ProcessCommand),
    #[command(about = "Write temporary credentials to the AWS shared credentials file")]
    Auth(AuthCommand),
    #[command(
        about = "Store role and token settings for a profile (prompts unless flags are given)"
    )]
    Configure(ConfigureCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let profile = self.profile;
        let command = self
            .command
            .unwrap_or(Commands::Process(ProcessCommand::default()));

        match command {
            Commands::Process(cmd) => cmd.execute(&profile, self.exchange).await,
            Commands::Auth(cmd) => cmd.execute(&profile, self.exchange).await,
            Commands::Configure(cmd) => cmd.execute(&profile, self.exchange).await,
        }
    }
}

/// Map a failed run to the process exit status
pub fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(Error::Config(_)) => EXIT_CONFIG_ERROR,
        _ => EXIT_FAILURE,
    }
}
