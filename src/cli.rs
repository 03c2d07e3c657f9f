use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "authgate", about = "Credential issuance and verification service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the service.
    Serve {
        #[arg(long, env = "AUTHGATE_PORT")]
        port: Option<u16>,
    },
    /// Operator commands against the token store.
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a token for an identity, revoking any prior ones for the scope.
    Issue {
        #[arg(long)]
        identity: i64,
        #[arg(long, default_value = "authentication")]
        scope: String,
    },
    /// Revoke every token an identity holds under a scope.
    Revoke {
        #[arg(long)]
        identity: i64,
        #[arg(long, default_value = "authentication")]
        scope: String,
    },
}
