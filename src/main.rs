use clap::Parser;
use encryptoor::cli::{commands, output, Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let log_level = encryptoor::cli::load_settings(&cli)
        .map(|(s, _)| s.log_level)
        .unwrap_or_else(|_| "warn".to_string());
    encryptoor::cli::init_tracing(&log_level);

    if let Err(e) = encryptoor::host::harden_process() {
        tracing::warn!(error = %e, "process hardening unavailable");
    }

    let result = match cli.command {
        Commands::Status => commands::status::execute(&cli),
        Commands::Create => commands::create::execute(&cli),
        Commands::List => commands::list::execute(&cli),
        Commands::AddLogin {
            ref title,
            ref username,
            ref website,
            ref id,
        } => commands::add_login::execute(&cli, title, username, website, id.as_deref()),
        Commands::AddNote {
            ref title,
            ref body,
            ref id,
        } => commands::add_note::execute(&cli, title, body, id.as_deref()),
        Commands::Remove { ref id } => commands::remove::execute(&cli, id),
        Commands::Show { ref id } => commands::show::execute(&cli, id),
        Commands::Copy { ref id } => commands::copy::execute(&cli, id),
        Commands::Passwd => commands::passwd::execute(&cli),
        Commands::Export { new_password } => commands::export::execute(&cli, new_password),
        Commands::Import { ref file } => commands::import_cmd::execute(&cli, file),
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}
