//! # Lipstick Compositor
//!
//! Entry point: parses the command line, loads the configuration and runs
//! the Wayland frontend until interrupted.

use anyhow::Result;
use clap::Parser;
use log::{error, info};

use lipstick::{logging, CompositorServer, LipstickConfig};

#[derive(Parser)]
#[command(name = "lipstick-compositor")]
#[command(about = "Window and surface lifecycle core of a mobile Wayland compositor")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/lipstick/compositor.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Fixed Wayland socket name instead of the first free wayland-N
    #[arg(long)]
    socket: Option<String>,

    /// Turn right mouse button presses into the back key
    #[arg(long)]
    synthesize_back_event: bool,

    /// Run without the D-Bus control interface and session activation
    #[arg(long)]
    no_dbus: bool,
}

impl Cli {
    /// Applies the flags that override the configuration file.
    fn apply(&self, config: &mut LipstickConfig) {
        if self.debug {
            config.general.debug = true;
        }
        if let Some(socket) = &self.socket {
            config.compositor.socket_name = Some(socket.clone());
        }
        if self.synthesize_back_event {
            config.compositor.synthesize_back_event = true;
        }
        if self.no_dbus {
            config.dbus.enabled = false;
            info!("🚫 D-Bus disabled via CLI flag");
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    info!("🚀 Starting Lipstick compositor");
    info!(
        "📄 Version: {} (built {})",
        lipstick::VERSION,
        env!("BUILD_DATE")
    );

    let mut config = match LipstickConfig::load(&cli.config) {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            info!("📝 Using default configuration");
            LipstickConfig::default()
        }
    };
    cli.apply(&mut config);
    logging::set_debug(config.general.debug);

    let server = CompositorServer::new(&config)?;
    info!("✨ Compositor ready on {}", server.socket_name());
    server.run()?;

    info!("👋 Lipstick compositor shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["lipstick-compositor"]).unwrap();
        assert!(!cli.debug);
        assert!(!cli.no_dbus);
        assert!(cli.socket.is_none());
        assert_eq!(cli.config, "~/.config/lipstick/compositor.toml");
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "lipstick-compositor",
            "--debug",
            "--socket",
            "wayland-lipstick",
            "--synthesize-back-event",
            "--no-dbus",
        ])
        .unwrap();

        let mut config = LipstickConfig::default();
        cli.apply(&mut config);
        assert!(config.general.debug);
        assert!(config.compositor.synthesize_back_event);
        assert!(!config.dbus.enabled);
        assert_eq!(
            config.compositor.socket_name.as_deref(),
            Some("wayland-lipstick")
        );
    }
}
