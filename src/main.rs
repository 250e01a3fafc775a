//! kgstore CLI: file-backed triple store.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use kgstore::engine::{Engine, EngineConfig};
use kgstore::graph::Triple;
use kgstore::store::CodecProfile;

#[derive(Parser)]
#[command(name = "kgstore", version, about = "File-backed knowledge graph of triples")]
struct Cli {
    /// Graph file to operate on.
    #[arg(long, short, global = true, default_value = "knowledge_graph.kg")]
    graph: PathBuf,

    /// TOML config file (`codec`, `case_sensitive`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Wire format of the graph file: binary or json. Overrides the config file.
    #[arg(long, global = true)]
    codec: Option<CodecProfile>,

    /// Match labels case-sensitively (`--case-sensitive` or
    /// `--case-sensitive=false`). Overrides the config file.
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    case_sensitive: Option<bool>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert a triple.
    Insert {
        subject: String,
        predicate: String,
        object: String,
    },

    /// Remove a triple.
    Remove {
        subject: String,
        predicate: String,
        object: String,
    },

    /// Search triples. Omitted filters match anything.
    Find {
        #[arg(long, short, default_value = "")]
        subject: String,
        #[arg(long, short, default_value = "")]
        predicate: String,
        #[arg(long, short, default_value = "")]
        object: String,
    },

    /// Show every triple mentioning an entity.
    Describe { entity: String },

    /// List the predicates pointing from one entity to another.
    Relations { from: String, to: String },

    /// List all node labels.
    Nodes,

    /// List all distinct predicate labels.
    Predicates,

    /// Group the outgoing edges of a subject by predicate.
    Subject { subject: String },

    /// Group the incoming edges of an object by predicate.
    Object { object: String },

    /// List the (subject, object) pairs joined by a predicate.
    Predicate { predicate: String },

    /// Show graph statistics.
    Info,

    /// Export all triples as JSON.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    }
    .with_overrides(cli.codec, cli.case_sensitive);
    let cs = config.case_sensitive;
    let engine = Engine::new(config);
    let path = cli.graph.as_path();

    match cli.command {
        Commands::Insert {
            subject,
            predicate,
            object,
        } => {
            engine.insert(path, &subject, &predicate, &object, cs)?;
            println!("Inserted ({subject}, {predicate}, {object})");
        }

        Commands::Remove {
            subject,
            predicate,
            object,
        } => {
            if engine.remove(path, &subject, &predicate, &object, cs)? {
                println!("Removed ({subject}, {predicate}, {object})");
            } else {
                println!("No such triple: ({subject}, {predicate}, {object})");
            }
        }

        Commands::Find {
            subject,
            predicate,
            object,
        } => {
            let triples = engine.find(path, &subject, &predicate, &object, cs)?;
            print_triples(&triples);
        }

        Commands::Describe { entity } => {
            let description = engine.describe_grouped(path, &entity, cs)?;
            if description.is_empty() {
                println!("No triples mention \"{entity}\".");
            } else {
                println!("{entity}");
                println!("  as subject:");
                for t in &description.as_subject {
                    println!("    {} {}", t.predicate, t.object);
                }
                println!("  as object:");
                for t in &description.as_object {
                    println!("    {} {}", t.subject, t.predicate);
                }
            }
        }

        Commands::Relations { from, to } => {
            let labels = engine.relations_between(path, &from, &to, cs)?;
            if labels.is_empty() {
                println!("No relation from \"{from}\" to \"{to}\".");
            }
            for label in labels {
                println!("{label}");
            }
        }

        Commands::Nodes => {
            for label in engine.list_nodes(path)? {
                println!("{label}");
            }
        }

        Commands::Predicates => {
            for label in engine.list_predicates(path)? {
                println!("{label}");
            }
        }

        Commands::Subject { subject } => match engine.query_by_subject(path, &subject, cs)? {
            Some(groups) => {
                for (predicate, objects) in groups {
                    println!("{predicate}: {}", objects.join(", "));
                }
            }
            None => println!("Unknown subject \"{subject}\"."),
        },

        Commands::Object { object } => match engine.query_by_object(path, &object, cs)? {
            Some(groups) => {
                for (predicate, subjects) in groups {
                    println!("{predicate}: {}", subjects.join(", "));
                }
            }
            None => println!("Unknown object \"{object}\"."),
        },

        Commands::Predicate { predicate } => {
            match engine.query_by_predicate(path, &predicate, cs)? {
                Some(pairs) => {
                    for (subject, object) in pairs {
                        println!("{subject} -> {object}");
                    }
                }
                None => println!("Unknown predicate \"{predicate}\"."),
            }
        }

        Commands::Info => {
            print!("{}", engine.info(path)?);
            println!("  file:        {}", path.display());
        }

        Commands::Export { output } => {
            let triples = engine.find(path, "", "", "", cs)?;
            let json = serde_json::to_string_pretty(&triples).into_diagnostic()?;
            write_output(output.as_deref(), &json)?;
        }
    }

    Ok(())
}

fn print_triples(triples: &[Triple]) {
    if triples.is_empty() {
        println!("No matching triples.");
        return;
    }
    for t in triples {
        println!("{t}");
    }
    println!("{} triple(s)", triples.len());
}

fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(file) => {
            std::fs::write(file, content).into_diagnostic()?;
            tracing::info!(path = %file.display(), bytes = content.len(), "exported triples");
        }
        None => println!("{content}"),
    }
    Ok(())
}
