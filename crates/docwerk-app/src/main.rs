// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Docwerk — document automation from the command line.
//
// Entry point. Initialises logging, loads the configuration, runs one
// operation and prints its outcome as JSON on stdout.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use docwerk_core::AppConfig;
use docwerk_core::types::ServiceOutcome;

use services::data_dir;
use services::document_service::DocumentService;

/// Fill word-processing templates and prepare PDFs.
#[derive(Parser, Debug)]
#[command(name = "docwerk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Substitute every {tag} in a template from a JSON data file
    Fill {
        /// Template document (.docx or JSON)
        #[arg(long)]
        template: PathBuf,

        /// Data file mapping tag keys to text or image objects
        #[arg(long)]
        data: PathBuf,
    },

    /// Replace {QR} with a QR code, rendered from text or taken from an image
    Qr {
        #[arg(long)]
        template: PathBuf,

        /// Text to encode
        #[arg(long, required_unless_present = "image", conflicts_with = "image")]
        text: Option<String>,

        /// QR code already rendered (PNG or JPEG)
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Replace one tag with an image sized by its pixel dimensions
    Image {
        #[arg(long)]
        template: PathBuf,

        /// Tag to replace, with or without braces
        #[arg(long)]
        tag: String,

        #[arg(long)]
        image: PathBuf,
    },

    /// Convert PDFs and images and merge them into one PDF
    Merge {
        /// Output file (defaults to a fresh file in the output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Input files, merged in the order given
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Imprint a registration number and Code 128 barcode on every page of a PDF
    Stamp {
        #[arg(long)]
        pdf: PathBuf,

        /// Text encoded as a Code 128 barcode
        #[arg(long)]
        barcode: String,

        /// Registration number drawn above the barcode
        #[arg(long, default_value = "")]
        reg_number: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(?cli, "Docwerk starting");

    let config_path = cli.config.clone().unwrap_or_else(data_dir::default_config_path);
    let outcome = match AppConfig::load(&config_path) {
        Ok(config) => run(DocumentService::new(config), cli.command),
        Err(err) => {
            tracing::error!(
                error = %err,
                path = %config_path.display(),
                "configuration failed to load"
            );
            ServiceOutcome::failure(format!("Error loading configuration. {err}"))
        }
    };

    match serde_json::to_string_pretty(&outcome) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::error!(error = %err, "cannot serialise outcome"),
    }

    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run(service: DocumentService, command: Command) -> ServiceOutcome {
    match command {
        Command::Fill { template, data } => service.fill_template_from_file(&template, &data),
        Command::Qr {
            template,
            text,
            image,
        } => match (text, image) {
            (Some(text), _) => service.replace_qr(&template, &text),
            (None, Some(image)) => service.replace_qr_image(&template, &image),
            (None, None) => {
                ServiceOutcome::failure("Error inserting QR code. No text or image given.")
            }
        },
        Command::Image {
            template,
            tag,
            image,
        } => service.replace_image(&template, &tag, &image),
        Command::Merge { output, inputs } => service.generate_pdf(&inputs, output.as_deref()),
        Command::Stamp {
            pdf,
            barcode,
            reg_number,
        } => service.imprint_barcode(&pdf, &barcode, &reg_number),
    }
}
