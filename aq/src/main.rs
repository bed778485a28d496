//! aq: Ambit Query - CLI for compiling queries and reading resource trees.

use clap::{Parser, Subcommand};

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "aq")]
#[command(about = "Ambit Query - compile resource queries and read result trees")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the ambit store
    Init,

    /// Show the tokens of a query string
    Lex {
        /// Query string (e.g., "Hosts/cpu_count>4&fields=Hosts/host_name")
        query: String,
    },

    /// Compile a query string and show its predicate
    Parse {
        /// Query string
        query: String,

        /// Print the predicate tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report property paths a resource type does not support
    Check {
        /// Resource type (e.g., Host or hosts)
        resource_type: String,

        /// Property paths to check
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Create resources from a JSON file of flat property objects
    Load {
        /// Resource type (e.g., Host or hosts)
        resource_type: String,

        /// JSON file holding an array of {"Category/property": "value"} objects
        file: String,
    },

    /// Read a resource or collection and print its result tree as JSON
    Get {
        /// Request URI (e.g., /api/v1/clusters/c1/hosts?Hosts/cpu_count>4)
        uri: String,

        /// Query string overriding the one in the URI
        #[arg(short = 'q', long = "body-query")]
        body_query: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init(),
        Commands::Lex { query } => commands::lex(&query),
        Commands::Parse { query, json } => commands::parse(&query, json),
        Commands::Check { resource_type, paths } => commands::check(&resource_type, &paths),
        Commands::Load { resource_type, file } => commands::load(&resource_type, &file),
        Commands::Get { uri, body_query } => commands::get(&uri, body_query.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
