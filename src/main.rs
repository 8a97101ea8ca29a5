//! Fish Classifier CLI
//!
//! Trains the MobileNetV2 transfer-learning classifier on a folder-per-species
//! dataset and runs the interactive species lookup session.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use fish_classifier::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use fish_classifier::dataset::{AugmentationConfig, BatchSource, FishDataset};
use fish_classifier::inference::{BurnSpeciesModel, Predictor};
use fish_classifier::model::{build_pretrained, save_model, FishClassifierConfig, WeightsSource};
use fish_classifier::session::{
    show_reference, ConsoleViewer, FileUploader, FixedUploader, PromptUploader, Session,
    UploadedFile,
};
use fish_classifier::training::Trainer;
use fish_classifier::utils::format_bar;
use fish_classifier::utils::logging::{init_logging, LogConfig};
use fish_classifier::{FishConfig, ReferenceLibrary};

/// Freshwater Fish Species Classifier
///
/// Transfer learning on an ImageNet-pretrained MobileNetV2 with the Burn framework.
#[derive(Parser, Debug)]
#[command(name = "fish_classifier")]
#[command(version)]
#[command(about = "Freshwater fish species classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, default_value = "false")]
    quiet: bool,

    /// JSON configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the classifier and write the model and class index
    Train {
        /// Dataset directory with one subdirectory per species
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Directory receiving the model artifact and class index
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Number of training epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Batch size
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Learning rate
        #[arg(short, long)]
        learning_rate: Option<f64>,

        /// Fraction of each species held out for validation
        #[arg(long)]
        validation_split: Option<f64>,

        /// Random seed for shuffling and augmentation
        #[arg(long)]
        seed: Option<u64>,

        /// Local MobileNetV2 checkpoint instead of downloading it
        #[arg(long)]
        weights_file: Option<PathBuf>,

        /// Train only the dense head
        #[arg(long, default_value = "false")]
        freeze_backbone: bool,

        /// Disable rotation, zoom and flip augmentation
        #[arg(long, default_value = "false")]
        no_augmentation: bool,

        /// Do not save the model when training stops on an error
        #[arg(long, default_value = "false")]
        discard_on_failure: bool,

        /// Write the effective configuration to this file
        #[arg(long)]
        save_config: Option<PathBuf>,
    },

    /// Interactive session: predict species from images or look up a species
    Interactive {
        /// Directory holding the model artifact and class index
        #[arg(short, long)]
        model_dir: Option<PathBuf>,

        /// Also save every displayed image as PNG into this directory
        #[arg(long)]
        save_shown: Option<PathBuf>,
    },

    /// Predict the species of one or more image files
    Predict {
        /// Image files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory holding the model artifact and class index
        #[arg(short, long)]
        model_dir: Option<PathBuf>,

        /// Also save every displayed image as PNG into this directory
        #[arg(long)]
        save_shown: Option<PathBuf>,
    },

    /// Print the description and a sample image of a species
    Lookup {
        /// Species name, exactly as the folder and description file are named
        name: String,

        /// Also save the displayed image as PNG into this directory
        #[arg(long)]
        save_shown: Option<PathBuf>,
    },

    /// Show dataset statistics
    Stats {
        /// Dataset directory with one subdirectory per species
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&LogConfig::from_flags(cli.verbose, cli.quiet)) {
        eprintln!("{} {}", "Warning:".yellow(), e);
    }

    let mut config = FishConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Train {
            data_dir,
            output_dir,
            epochs,
            batch_size,
            learning_rate,
            validation_split,
            seed,
            weights_file,
            freeze_backbone,
            no_augmentation,
            discard_on_failure,
            save_config,
        } => {
            print_banner();

            if let Some(dir) = data_dir {
                config.paths.dataset_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.paths.output_dir = dir;
            }
            if let Some(path) = weights_file {
                config.paths.weights_file = Some(path);
            }
            if let Some(epochs) = epochs {
                config.training.epochs = epochs;
            }
            if let Some(batch_size) = batch_size {
                config.training.batch_size = batch_size;
            }
            if let Some(lr) = learning_rate {
                config.training.learning_rate = lr;
            }
            if let Some(split) = validation_split {
                config.training.validation_split = split;
            }
            if let Some(seed) = seed {
                config.training.seed = seed;
            }
            if freeze_backbone {
                config.training.freeze_backbone = true;
            }
            if no_augmentation {
                config.augmentation = AugmentationConfig::none();
            }
            if discard_on_failure {
                config.training.persist_on_failure = false;
            }
            config.validate().context("Invalid configuration")?;

            if let Some(path) = save_config {
                config.save(&path)?;
                info!("Configuration written to {:?}", path);
            }

            cmd_train(&config)?;
        }

        Commands::Interactive {
            model_dir,
            save_shown,
        } => {
            print_banner();
            if let Some(dir) = model_dir {
                config.paths.output_dir = dir;
            }
            cmd_interactive(&config, save_shown)?;
        }

        Commands::Predict {
            inputs,
            model_dir,
            save_shown,
        } => {
            if let Some(dir) = model_dir {
                config.paths.output_dir = dir;
            }
            cmd_predict(&config, &inputs, save_shown)?;
        }

        Commands::Lookup { name, save_shown } => {
            cmd_lookup(&config, &name, save_shown)?;
        }

        Commands::Stats { data_dir } => {
            if let Some(dir) = data_dir {
                config.paths.dataset_dir = dir;
            }
            cmd_stats(&config)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════════════════════╗
 ║   Freshwater Fish Species Classifier                                 ║
 ║   MobileNetV2 Transfer Learning with Burn + Rust                     ║
 ╚══════════════════════════════════════════════════════════════════════╝
  "#
        .cyan()
    );
}

fn viewer_for(save_shown: Option<PathBuf>) -> ConsoleViewer {
    match save_shown {
        Some(dir) => ConsoleViewer::saving_to(dir),
        None => ConsoleViewer::new(),
    }
}

fn load_predictor(config: &FishConfig) -> Result<Predictor<BurnSpeciesModel<DefaultBackend>>> {
    let model_path = config.paths.model_path();
    let class_index_path = config.paths.class_index_path();
    Predictor::<BurnSpeciesModel<DefaultBackend>>::load(
        &model_path,
        &class_index_path,
        default_device(),
    )
    .with_context(|| {
        format!(
            "Failed to load the classifier from {}; run `fish_classifier train` first",
            config.paths.output_dir.display()
        )
    })
}

fn reference_library(config: &FishConfig) -> ReferenceLibrary {
    ReferenceLibrary::new(&config.paths.info_dir, &config.paths.dataset_dir)
        .with_display_size(config.training.image_size)
}

fn cmd_train(config: &FishConfig) -> Result<()> {
    let training = &config.training;

    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Backend:          {}", backend_name());
    println!("  Dataset:          {}", config.paths.dataset_dir.display());
    println!("  Output:           {}", config.paths.output_dir.display());
    println!("  Epochs:           {}", training.epochs);
    println!("  Batch size:       {}", training.batch_size);
    println!("  Learning rate:    {}", training.learning_rate);
    println!("  Validation split: {:.0}%", training.validation_split * 100.0);
    println!("  Image size:       {}x{}", training.image_size, training.image_size);
    println!(
        "  Augmentation:     {}",
        if config.augmentation.is_enabled() { "on" } else { "off" }
    );
    println!(
        "  Backbone:         {}",
        if training.freeze_backbone { "frozen" } else { "trainable" }
    );
    println!();

    let dataset = FishDataset::scan(&config.paths.dataset_dir)
        .context("Failed to scan the dataset")?;
    let splits = dataset.split(training.validation_split)?;
    info!(
        "{} training / {} validation images across {} species",
        splits.train.len(),
        splits.validation.len(),
        splits.num_classes
    );

    let weights = match &config.paths.weights_file {
        Some(path) => WeightsSource::File(path.clone()),
        None => WeightsSource::imagenet(&config.paths.weights_cache_dir),
    };

    let device = default_device();
    let model_config =
        FishClassifierConfig::new(splits.num_classes).with_image_size(training.image_size);
    let model = build_pretrained::<TrainingBackend>(
        &model_config,
        &weights,
        training.freeze_backbone,
        &device,
    )
    .context("Failed to build the pretrained classifier")?;

    let train_source = BatchSource::<TrainingBackend>::training(
        splits.train,
        splits.num_classes,
        training.image_size,
        training.batch_size,
        config.augmentation.clone(),
        device.clone(),
    );
    let valid_source = BatchSource::<DefaultBackend>::validation(
        splits.validation,
        splits.num_classes,
        training.image_size,
        training.batch_size,
        device,
    );

    let trainer = Trainer::new(training.clone());
    let outcome = trainer.fit(model, &train_source, &valid_source);
    outcome.history().print_summary();

    let model_path = config.paths.model_path();
    if let Some(cause) = outcome.cause() {
        println!("{} Training stopped early: {}", "Error:".red().bold(), cause);
        if !training.persist_on_failure {
            warn!("Discarding the partially trained model");
            anyhow::bail!("training failed: {cause}");
        }
    }

    // The model and the class index are written together, and only here
    std::fs::create_dir_all(&config.paths.output_dir)?;
    save_model(outcome.model(), &model_config, &model_path)?;
    println!("{} Model saved to {}", "✓".green(), model_path.display());

    let class_index_path = config.paths.class_index_path();
    dataset.class_index.save(&class_index_path)?;
    println!(
        "{} Class index saved to {}",
        "✓".green(),
        class_index_path.display()
    );
    Ok(())
}

fn cmd_interactive(config: &FishConfig, save_shown: Option<PathBuf>) -> Result<()> {
    let predictor = load_predictor(config)?;
    let library = reference_library(config);

    println!(
        "{} {} species loaded",
        "Ready:".green().bold(),
        predictor.labels().len()
    );
    println!();

    let mut session = Session::new(&predictor, &library, PromptUploader, viewer_for(save_shown));
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    session.run(&mut input, &mut output)?;
    output.flush()?;
    Ok(())
}

fn cmd_predict(config: &FishConfig, inputs: &[PathBuf], save_shown: Option<PathBuf>) -> Result<()> {
    let predictor = load_predictor(config)?;
    let library = reference_library(config);
    let mut output = std::io::stdout();

    let mut files = Vec::with_capacity(inputs.len());
    for path in inputs {
        match UploadedFile::from_path(path) {
            Ok(file) => files.push(file),
            Err(e) => println!("{} {}", "Error:".red(), e),
        }
    }

    let mut uploader = FixedUploader::new([files]);
    let uploads = uploader.upload(&mut std::io::empty(), &mut output)?;

    let mut session = Session::new(&predictor, &library, uploader, viewer_for(save_shown));
    session.handle_uploads(uploads, &mut output)?;
    Ok(())
}

fn cmd_lookup(config: &FishConfig, name: &str, save_shown: Option<PathBuf>) -> Result<()> {
    let library = reference_library(config);
    let mut viewer = viewer_for(save_shown);
    let mut output = std::io::stdout();
    show_reference(&library, &mut viewer, name, &mut output)?;
    Ok(())
}

fn cmd_stats(config: &FishConfig) -> Result<()> {
    let data_dir: &Path = &config.paths.dataset_dir;
    info!("Computing dataset statistics for: {:?}", data_dir);

    if !data_dir.exists() {
        println!(
            "{} Dataset directory not found: {}",
            "Error:".red(),
            data_dir.display()
        );
        return Ok(());
    }

    let dataset = FishDataset::scan(data_dir)?;
    let stats = dataset.stats();
    let fraction = config.training.validation_split;

    println!("{}", "Dataset Statistics:".cyan().bold());
    println!("  Total samples:     {}", stats.total_samples);
    println!("  Number of species: {}", stats.num_classes);
    println!();

    let validation: usize = (0..stats.num_classes)
        .map(|label| stats.validation_count(label, fraction))
        .sum();
    println!(
        "{}",
        format!("Split ({:.0}% validation per species):", fraction * 100.0)
            .yellow()
            .bold()
    );
    println!("  Training:   {}", stats.total_samples - validation);
    println!("  Validation: {}", validation);
    println!();

    println!("{}", "Class Distribution:".cyan().bold());
    let max_count = stats.class_counts.iter().copied().max().unwrap_or(0);
    for (label, (name, count)) in stats
        .class_names
        .iter()
        .zip(&stats.class_counts)
        .enumerate()
    {
        println!(
            "  {:>2}. {:<24} {:>5} {}  (val {})",
            label,
            name,
            count,
            format_bar(*count, max_count, 20),
            stats.validation_count(label, fraction)
        );
    }

    Ok(())
}
