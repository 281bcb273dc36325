//! Show how a blended search request is split across the configured backends.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use blender_core::config::Config;
use blender_core::traits::BackendParams;
use blender_core::types::RawRequest;
use blender_mapping::MappingTable;
use blender_params::{BlendedParams, StandardParams};

#[derive(Parser, Debug)]
#[command(name = "blender-explain")]
#[command(about = "Print the per-backend parameters of a blended search", long_about = None)]
struct Args {
    /// Config file (TOML or JSON); layered blender.toml lookup when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, default_value = "")]
    lookfor: String,

    /// Canonical search type
    #[arg(short = 't', long = "type")]
    search_type: Option<String>,

    #[arg(short, long)]
    sort: Option<String>,

    /// Canonical filter, `[-|~]field:value`; repeatable
    #[arg(short, long = "filter")]
    filters: Vec<String>,

    #[arg(long)]
    page: Option<usize>,

    #[arg(long)]
    limit: Option<usize>,
}

impl Args {
    fn request(&self) -> RawRequest {
        let mut request = RawRequest::new().with("lookfor", self.lookfor.as_str());
        if let Some(t) = &self.search_type {
            request.set("type", t.as_str());
        }
        if let Some(s) = &self.sort {
            request.set("sort", s.as_str());
        }
        if !self.filters.is_empty() {
            request.set_all("filter", self.filters.iter().map(String::as_str));
        }
        if let Some(p) = self.page {
            request.set("page", p.to_string());
        }
        if let Some(l) = self.limit {
            request.set("limit", l.to_string());
        }
        request
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    let mappings = Arc::new(MappingTable::from_config(&config)?);
    let backends = config.backends()?;
    info!(backends = backends.len(), "Loaded blending configuration");

    let secondaries: Vec<Box<dyn BackendParams>> = backends
        .iter()
        .map(|b| Box::new(StandardParams::new(b.id.as_str())) as Box<dyn BackendParams>)
        .collect();
    let mut params = BlendedParams::new(mappings, Box::new(StandardParams::new("Blender")), secondaries);
    params.init_from_request(&args.request());

    for backend in &backends {
        let unsupported: Vec<String> =
            params.gate().unsupported_filters(&backend.id).iter().map(ToString::to_string).collect();
        if params.gate().is_disabled(&backend.id) {
            println!("{} ({}): excluded {:?}", backend.id, backend.label, unsupported);
        } else {
            println!("{} ({}): active", backend.id, backend.label);
        }
    }

    let bag = params.backend_parameters()?;
    println!("{}", serde_json::to_string_pretty(&bag)?);
    Ok(())
}
