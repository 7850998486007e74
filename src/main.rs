//! Deckshell CLI

use clap::{Parser, Subcommand};
use colored::*;
use deckshell::models::ExtensionMetadata;
use deckshell::{parser, ExtensionLoader};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deckshell")]
#[command(about = "Extension-compatibility tooling for the dashboard shell", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform every extension under a directory without launching a host
    Prepare {
        /// Extensions root (one subdirectory per extension)
        #[arg(short, long, default_value = "extensions")]
        extensions: PathBuf,
    },

    /// Inspect a single extension directory
    Inspect {
        /// Path to the extension directory
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare { extensions } => {
            println!("{}", "Deckshell extension preparation".bold().blue());
            println!("{}", "=".repeat(50).blue());
            println!();

            match ExtensionLoader::new(&extensions).prepare_all() {
                Ok(report) => {
                    println!("{}", "Preparation complete".green().bold());
                    println!();
                    print!("{}", report.render_text());

                    if !report.skipped.is_empty() {
                        println!();
                        println!("{}", "Some extensions were skipped:".yellow().bold());
                        for skipped in &report.skipped {
                            println!("  - {}: {}", skipped.dir.display(), skipped.reason);
                        }
                    }
                }
                Err(err) => {
                    eprintln!("{}", "Preparation failed".red().bold());
                    eprintln!("{}", format!("Error: {err:#}").red());
                    std::process::exit(1);
                }
            }
        }

        Commands::Inspect { input } => {
            println!("{}", "Inspecting extension...".bold());
            println!();

            match parser::parse_manifest_from_file(input.join("manifest.json")) {
                Ok(manifest) => {
                    let metadata = ExtensionMetadata::collect(&input, &manifest);
                    println!("{}", "Extension details".bold().blue());
                    println!("  - Name: {}", metadata.name);
                    println!("  - Version: {}", metadata.version);
                    println!("  - Manifest version: {}", metadata.manifest_version);
                    println!("  - Files: {}", metadata.file_count);
                    println!("  - Size: {} bytes", metadata.size_bytes);
                    println!(
                        "  - Background execution: {}",
                        if metadata.has_background {
                            "yes (will be stripped)".yellow().to_string()
                        } else {
                            "no".to_string()
                        }
                    );
                    println!(
                        "  - Content scripts: {}",
                        if metadata.has_content_scripts { "yes" } else { "no" }
                    );
                }
                Err(err) => {
                    eprintln!("{}", "Inspection failed".red().bold());
                    eprintln!("{}", format!("Error: {err}").red());
                    std::process::exit(1);
                }
            }
        }
    }
}
