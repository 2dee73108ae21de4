use anyhow::Context;
use capstan::kernel::config::load_config;
use capstan::kernel::domain::config::KernelConfig;
use capstan::kernel::runtime::RuntimeProfile;
use capstan_logger::Logger;
use capstan_server::Server;
use std::path::Path;

const DEFAULT_CONFIG: &str = "capstan.toml";

fn main() -> anyhow::Result<()> {
    // An explicit path must exist; the default file is optional.
    let path = std::env::args()
        .nth(1)
        .or_else(|| Path::new(DEFAULT_CONFIG).exists().then(|| DEFAULT_CONFIG.to_owned()));
    let cfg: KernelConfig = load_config(path.as_deref()).context("Critical: Configuration is malformed")?;

    let _log = Logger::from_config(env!("CARGO_PKG_NAME"), &cfg.logging)?;

    let runtime = RuntimeProfile::from(&cfg.runtime).build()?;
    runtime.block_on(async { Server::builder().config(cfg).build()?.run().await })
}
