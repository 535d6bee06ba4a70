//! modmask CLI
//!
//! Runs the modifier verification harness against the kernel input stack and
//! offers a few offline helpers around the mask translator.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use modmask_config::Config;
use modmask_core::{translate, ButtonBudget, ModifierKey, NativeLayout};
use modmask_harness::{device, EvdevEventSource, Harness, PointerTracker, UinputRobot};
use tracing_subscriber::EnvFilter;

const ROBOT_DEVICE_NAME: &str = "modmask-robot";

#[derive(Parser, Debug)]
#[command(name = "modmask")]
#[command(about = "Verify that pointer events carry the right modifier mask")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = modmask_config::DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the robot through every enabled scenario
    Run(RunArgs),

    /// Translate a native modifier mask into the normalized encoding
    Translate {
        /// Native platform encoding
        #[arg(short, long, default_value = "x11")]
        layout: NativeLayout,

        /// Buttons the platform reports
        #[arg(short, long, default_value_t = ButtonBudget::MAX)]
        buttons: u8,

        /// Native mask, hex with 0x prefix or decimal
        #[arg(value_parser = parse_mask)]
        mask: u32,
    },

    /// List the known native layouts
    Layouts,

    /// Validate the configuration file
    Validate,

    /// List available input devices
    Devices,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Skip scenarios holding this modifier (repeatable)
    #[arg(long = "skip-modifier", value_name = "KEY")]
    skip_modifier: Vec<ModifierKey>,

    /// Let the desktop see the robot's input as well
    #[arg(long)]
    no_grab: bool,

    /// Override the configured native layout
    #[arg(short, long)]
    layout: Option<NativeLayout>,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&cli.config).into_owned().into();

    match cli.command {
        Commands::Run(args) => cmd_run(&config_path, args).await,
        Commands::Translate {
            layout,
            buttons,
            mask,
        } => {
            init_tracing("warn");
            cmd_translate(&layout, buttons, mask)
        }
        Commands::Layouts => {
            init_tracing("warn");
            cmd_layouts()
        }
        Commands::Validate => {
            init_tracing("warn");
            cmd_validate(&config_path)
        }
        Commands::Devices => {
            init_tracing("warn");
            cmd_devices()
        }
    }
}

/// RUST_LOG wins over the configured level.
fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn parse_mask(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid mask '{}': {}", s, e))
}

fn harness_error(e: anyhow::Error) -> miette::Report {
    miette::miette!("{:#}", e)
}

fn load(config_path: &Path) -> miette::Result<Config> {
    modmask_config::load_config(config_path).map_err(miette::Report::new)
}

async fn cmd_run(config_path: &Path, args: RunArgs) -> miette::Result<()> {
    let mut config = load(config_path)?;
    init_tracing(config.harness.log_level.as_filter());

    if let Some(layout) = args.layout {
        config.harness.layout = layout;
    }
    let layout = config.harness.layout;
    let origin = config.surface.center();

    tracing::info!("Loaded configuration from {}", config_path.display());

    let mut robot = UinputRobot::new(ROBOT_DEVICE_NAME, layout, origin).map_err(harness_error)?;

    let (sender, events) = tokio::sync::mpsc::unbounded_channel();
    let tracker = PointerTracker::new(layout, ButtonBudget::default(), origin);
    let source =
        EvdevEventSource::spawn_when_ready(|| robot.devnode(), tracker, !args.no_grab, sender)
            .await
            .map_err(harness_error)?;

    let mut harness = Harness::new(robot, events, &config.harness, config.surface)
        .with_excluded_modifiers(args.skip_modifier);
    let report = harness.run(&config.scenarios).await.map_err(harness_error)?;

    if !source.is_running() {
        tracing::warn!("Event source stopped during the run");
    }

    if args.json {
        println!("{}", report.to_json().map_err(harness_error)?);
    } else {
        println!("{}", report);
    }

    if report.executed() == 0 {
        return Err(miette::miette!("no scenario ran, every selected variant was skipped"));
    }
    if !report.is_success() {
        return Err(miette::miette!("{} scenario(s) failed", report.failed()));
    }
    Ok(())
}

fn cmd_translate(layout: &NativeLayout, buttons: u8, native: u32) -> miette::Result<()> {
    let budget = ButtonBudget::for_layout(layout, buttons);
    let mask = translate(native, layout, budget);

    println!("{} 0x{:x} -> 0x{:x} {}", layout, native, mask.bits(), mask);

    let ignored = native & !layout.recognized_bits(budget);
    if ignored != 0 {
        println!("  ignored native bits: 0x{:x}", ignored);
    }
    Ok(())
}

fn cmd_layouts() -> miette::Result<()> {
    for layout in NativeLayout::ALL {
        println!("{}", layout);
        for key in ModifierKey::ALL {
            match layout.modifier_mask(key) {
                Some(bit) => println!("    {:<10} 0x{:x}", key.name(), bit),
                None => println!("    {:<10} -", key.name()),
            }
        }
        for n in 1..=ButtonBudget::MAX {
            match layout.button_mask(n) {
                Ok(bit) => println!("    button{:<4} 0x{:x}", n, bit),
                Err(_) => println!("    button{:<4} -", n),
            }
        }

        let unsupported = layout.unsupported_modifiers();
        if !unsupported.is_empty() {
            let names: Vec<_> = unsupported.iter().map(|k| k.name()).collect();
            println!("    scenarios holding {} are skipped", names.join(", "));
        }
        println!();
    }
    Ok(())
}

fn cmd_validate(config_path: &Path) -> miette::Result<()> {
    println!("Validating configuration: {}", config_path.display());

    let config = modmask_config::parse_config(config_path).map_err(miette::Report::new)?;

    println!("Configuration is valid!");
    println!(
        "  Layout: {} ({} button(s))",
        config.harness.layout,
        ButtonBudget::for_layout(&config.harness.layout, config.harness.button_count).count()
    );
    let (x, y) = config.surface.center();
    println!(
        "  Surface: {}x{} at ({}, {}), centre ({}, {})",
        config.surface.width, config.surface.height, config.surface.x, config.surface.y, x, y
    );
    println!("  Scenarios:");
    for kind in &config.scenarios.enabled {
        let variants: Vec<_> = config
            .scenarios
            .modifiers_for(*kind)
            .into_iter()
            .map(|m| m.map_or("none", ModifierKey::name))
            .collect();
        println!("    - {} [{}]", kind, variants.join(", "));
    }
    Ok(())
}

fn cmd_devices() -> miette::Result<()> {
    println!("Available input devices:\n");

    for info in device::enumerate_devices().map_err(harness_error)? {
        let marker = if info.name == ROBOT_DEVICE_NAME {
            " (leftover robot)"
        } else {
            ""
        };
        println!("  {} [{}]{}", info.name, info.kind, marker);
        println!("    Path: {}", info.path.display());
        println!("    ID: {}", info.vendor_product());
        println!();
    }

    Ok(())
}
