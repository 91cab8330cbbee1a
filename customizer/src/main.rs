//! This file starts the configurator by loading the configuration and running the viewer.

use std::{env, path::PathBuf, sync::Arc};

use catalog::{Catalog, EMBEDDED_CATALOG};
use color_eyre::{config::HookBuilder, Result};
use config::Config;
use gui::Controls;
use log::info;
use model::Session;
use viewer::Window;

fn main() -> Result<()> {
    HookBuilder::new().display_env_section(false).install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from("customizer.toml"), PathBuf::from);
    let config = if config_path.exists() {
        Config::try_from_path(&config_path)?
    } else {
        info!(
            "No configuration at {}, using the default",
            config_path.display()
        );
        Config::default()
    };

    let catalog = Arc::new(Catalog::try_from_toml(EMBEDDED_CATALOG)?);
    let session = Session::new(catalog.clone(), &config)?;
    let controls = Controls::new(&catalog, &config)?;

    let window = Window::try_new()?;
    window.run_render_loop(session, controls, &config.assets.root);

    Ok(())
}
