// src/main.rs
mod cli;
mod config;
mod crypto;
mod error;
mod gateway;
mod models;
mod screen;
mod session;
mod store;
mod tui;
mod validation;

use clap::Parser;

fn main() -> Result<(), error::AppError> {
    env_logger::init();
    log::info!("Starting LoginDetail-RS");

    let cli_args = cli::Cli::parse();
    let config = config::load_config();

    if let Err(e) = cli::handle_cli_command(cli_args, &config) {
        log::error!("Application failed: {:#?}", e);
        eprintln!("Error: {}", e);
        return Err(e);
    }

    log::info!("LoginDetail-RS finished successfully.");
    Ok(())
}
