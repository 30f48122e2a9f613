mod commands;
mod logging;
mod output;
mod sink;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use logging::{LogConfig, LogFormat};

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Recognize and import contract and procurement ledgers from spreadsheets"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that classify worksheets.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// TOML file with import settings
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Custom field catalog JSON file(s); each replaces the built-in catalog of its kind
    #[arg(short, long = "fields", value_name = "FILE")]
    fields: Vec<PathBuf>,

    /// Accept similar headers, not only exact names and aliases
    #[arg(long)]
    fuzzy: bool,

    /// Minimum matched fields for a worksheet to be recognized
    #[arg(long, value_name = "N")]
    min_match: Option<usize>,

    /// Non-blank rows to search for the header row
    #[arg(long, value_name = "ROWS")]
    header_scan_rows: Option<usize>,

    /// Reject rows whose required fields are missing or invalid
    #[arg(long)]
    validate: bool,

    /// Treat blank rows as data rows instead of skipping them
    #[arg(long)]
    keep_empty_rows: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every worksheet of a spreadsheet without importing rows
    Inspect {
        /// Path to an .xlsx, .xls or .ods file
        input_file: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Import one or more spreadsheets and report the job outcome
    Import {
        /// Spreadsheet files, processed in the given order
        #[arg(required = true)]
        files: Vec<String>,

        /// Write accepted records as JSON lines to this file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Maximum number of errors listed in the table summary
        #[arg(long, default_value_t = 20)]
        max_errors: usize,

        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Manage and inspect field catalogs
    Fields {
        #[command(subcommand)]
        action: FieldsAction,
    },
}

#[derive(Subcommand)]
enum FieldsAction {
    /// List built-in field catalogs
    List,
    /// Show the fields, aliases and cleaning rules of a catalog
    Explain {
        /// Preset name (contract or procurement)
        preset: String,
    },
    /// Print the JSON schema with field descriptions and example
    Schema,
    /// Validate a custom field catalog file
    Validate {
        /// Path to JSON catalog file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format);
    logging::init_logging(&log_config);

    let result = match cli.command {
        Commands::Inspect {
            input_file,
            output,
            settings,
        } => commands::inspect::run(&input_file, &output, &settings),
        Commands::Import {
            files,
            out,
            output,
            max_errors,
            settings,
        } => commands::import::run(files, out, &output, max_errors, &settings),
        Commands::Fields { action } => match action {
            FieldsAction::List => commands::fields::list(),
            FieldsAction::Explain { preset } => commands::fields::explain(&preset),
            FieldsAction::Schema => commands::fields::schema(),
            FieldsAction::Validate { file } => commands::fields::validate(&file),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
