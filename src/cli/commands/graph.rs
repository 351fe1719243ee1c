//! skillctl graph - Dependency order of a package or the whole catalog

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json};
use crate::core::components::{package_graph, requirement_graph};
use crate::core::graph::{Component, Resolution};
use crate::core::package::{Package, Provenance};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Package directory to order file by file
    #[arg(required_unless_present = "catalog", conflicts_with = "catalog")]
    pub path: Option<PathBuf>,

    /// Order registered packages by their `requires`
    #[arg(long)]
    pub catalog: bool,
}

#[derive(Serialize)]
struct GraphOutput {
    scope: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    components: Vec<Component>,
    #[serde(flatten)]
    resolution: Resolution,
}

pub fn run(ctx: &AppContext, args: &GraphArgs) -> Result<()> {
    let output = match &args.path {
        Some(path) => {
            let package = Package::load(path, Provenance::local())?;
            let built = package_graph(&package)?;
            GraphOutput {
                scope: package.id.clone(),
                resolution: built.graph.resolve()?,
                components: built.components,
            }
        }
        None => {
            let index = ctx.store.load()?;
            let graph = requirement_graph(
                index
                    .entries()
                    .map(|entry| (entry.id.as_str(), entry.requires.as_slice())),
            );
            GraphOutput {
                scope: "catalog".to_string(),
                resolution: graph.resolve()?,
                components: Vec::new(),
            }
        }
    };

    match ctx.output_format {
        OutputFormat::Json => emit_json(&output),
        OutputFormat::Plain => {
            for id in &output.resolution.order {
                let level = output.resolution.level_of(id).unwrap_or_default();
                println!("{level}\t{id}");
            }
            Ok(())
        }
        OutputFormat::Human => {
            emit_human(human_layout(&output));
            Ok(())
        }
    }
}

fn human_layout(output: &GraphOutput) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout.title(&format!("Dependency order for {}", output.scope));

    layout.section("Order");
    for (position, id) in output.resolution.order.iter().enumerate() {
        let role = output
            .components
            .iter()
            .find(|c| &c.id == id)
            .map(|c| format!(" ({})", c.role))
            .unwrap_or_default();
        layout.push_line(format!("{:>3}. {id}{role}", position + 1));
    }

    layout.blank().section("Levels");
    for (depth, group) in output.resolution.levels.iter().enumerate() {
        layout.kv(&format!("level {depth}"), &group.join(", "));
    }

    if !output.resolution.see_also.is_empty() {
        layout.blank().section("See also");
        for edge in &output.resolution.see_also {
            layout.bullet(&format!("{} -> {} ({})", edge.source, edge.target, edge.kind));
        }
    }
    layout
}
