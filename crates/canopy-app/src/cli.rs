use clap::{Parser, Subcommand};

/// Canopy: run tools inside durable, inspectable sessions.
#[derive(Parser, Debug)]
#[command(name = "canopy", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level override (debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Data directory override for the session store.
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// User the command runs as.
    #[arg(long, global = true, default_value = "local")]
    pub user: String,

    /// Run with administrator claims.
    #[arg(long, global = true)]
    pub admin: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the tools available to the current user.
    Tools {
        /// Print full specs, including schemas, as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Invoke a tool and record the call in a session.
    Call {
        /// Tool name.
        tool: String,

        /// Tool arguments as a JSON value.
        #[arg(short, long)]
        args: Option<String>,

        /// Continue an existing session instead of starting a new one.
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Print the message tree of a session.
    History {
        session: String,
    },

    /// List stored sessions, most recent first.
    Sessions {
        /// Include sessions of every user (requires --admin).
        #[arg(long)]
        all: bool,
    },
}

pub fn parse() -> Args {
    Args::parse()
}
