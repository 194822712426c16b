use anyhow::Context;
use clap::{Parser, Subcommand};
use convert_skeleton_json::config::{config_path, Settings};
use convert_skeleton_json::report::{validate_source_skeleton, Dialog};
use convert_skeleton_json::runtime::Scene;
use convert_skeleton_json::session::Session;
use convert_skeleton_json::templates::save_json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "convert-skeleton")]
#[command(about = "Convert a skeleton to a target layout using orientation and creation templates")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding the templates, overrides the config file
    #[arg(long, global = true)]
    templates: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available templates
    List,
    /// Create an empty template folder
    New { name: String },
    /// Delete a template folder
    Remove { name: String },
    /// Make a template the default for `convert`
    Select { name: String },
    /// Import a template from a zip archive
    Import { archive: PathBuf },
    /// Export a template to a zip archive
    Export { name: String, destination: PathBuf },
    /// Check the source skeleton without converting it
    Validate {
        #[arg(long)]
        scene: PathBuf,
        #[arg(long)]
        skeleton: String,
    },
    /// Apply a template to a skeleton in a scene file
    Convert {
        #[arg(long)]
        scene: PathBuf,
        #[arg(long)]
        skeleton: String,
        /// Template to apply, defaults to the selected one
        #[arg(long)]
        template: Option<String>,
        /// Where to write the converted scene, defaults to overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Bake the object rotation into the bones before converting
        #[arg(long)]
        apply_rotation: bool,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "convert_skeleton_json=info".into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_scene(path: &Path) -> anyhow::Result<Scene> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read scene {}", path.display()))?;
    Ok(Scene::load(&bytes)?)
}

fn main() {
    init_tracing();
    if let Err(err) = run(Cli::parse()) {
        let dialog = match err.downcast_ref::<convert_skeleton_json::Error>() {
            Some(err) => Dialog::from_error(err),
            None => Dialog::new("Error", format!("{:#}", err)),
        };
        eprintln!("{}", dialog.title);
        for line in dialog.lines() {
            eprintln!("  {}", line);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings_path = cli.config.clone().or_else(config_path);
    let mut settings = match &settings_path {
        Some(path) => Settings::load_or_default(path),
        None => Settings::default(),
    };
    if let Some(templates) = cli.templates {
        settings.templates_path = Some(templates);
    }
    let mut session = Session::new(&settings);

    match cli.command {
        Commands::List => {
            let mut entries = session.store().template_entries()?;
            entries.sort();
            for (name, title) in entries {
                let marker = if name == session.selected_template() { "*" } else { " " };
                println!("{} {:<24} {}", marker, name, title);
            }
        }
        Commands::New { name } => {
            let template_name = session.create_template(&name)?;
            println!("{}", session.store().template_path(&template_name)?.display());
        }
        Commands::Remove { name } => {
            session.select_template(&name)?;
            if !session.remove_selected_template()? {
                println!("the default template cannot be removed");
            }
        }
        Commands::Select { name } => {
            session.select_template(&name)?;
            settings.selected_template = name;
            let path = settings_path.context("Could not determine config directory")?;
            settings.save_to(&path)?;
        }
        Commands::Import { archive } => {
            let template_name = session.import_template(&archive)?;
            println!("{}", template_name);
        }
        Commands::Export { name, destination } => {
            session.select_template(&name)?;
            let path = session.export_template(&destination)?;
            println!("{}", path.display());
        }
        Commands::Validate { scene, skeleton } => {
            let scene = load_scene(&scene)?;
            for warning in validate_source_skeleton(&scene, &skeleton) {
                println!("warning: {}", warning);
            }
            let armature = scene.armature(&skeleton)?;
            println!("{}: {} bones", armature.name(), armature.len());
        }
        Commands::Convert { scene: scene_path, skeleton, template, output, apply_rotation } => {
            let mut scene = load_scene(&scene_path)?;
            if let Some(template) = template {
                session.select_template(&template)?;
            }
            if apply_rotation {
                scene.apply_rotation(&skeleton)?;
            }
            session.set_source_skeleton(skeleton);
            let report = session.convert(&mut scene)?;
            let output = output.unwrap_or(scene_path);
            save_json(&scene.to_raw(), &output)?;
            println!(
                "{}: {} orientation rules applied, {} bones created ({})",
                report.skeleton,
                report.reoriented,
                report.created.len(),
                report.template
            );
        }
    }
    Ok(())
}
