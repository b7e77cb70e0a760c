use clap::{Parser, Subcommand};

/// Coffee Shop: drink recipe catalog API
#[derive(Parser)]
#[command(name = "coffee-shop", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Port to bind (defaults to $PORT, then 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Apply database migrations
    Migrate {
        /// Also empty the drinks table and seed the default drink
        #[arg(long)]
        reset: bool,
    },

    /// Verify a bearer token against the configured identity provider
    VerifyToken {
        /// The raw JWT (without the "Bearer " prefix)
        token: String,
        /// Also require this permission, e.g. post:drinks
        #[arg(long)]
        permission: Option<String>,
    },
}
