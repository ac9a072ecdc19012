use crate::cli::run;

pub mod catalog;
pub mod cli;
pub mod client;
mod config;
pub mod domain;
pub mod recommend;
mod refresh;
pub mod server;
mod shutdown;

fn main() -> anyhow::Result<()> {
    run()
}
