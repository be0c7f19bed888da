use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use sentinel::serve::extract_payload;
use sentinel::trace::{
    layout, AgentRole, BadgeTone, GraphNode, Investigation, Msg, NodeId, TraceStatus, TraceStore,
};
use sentinel::{Config, Database};
use serde_json::Value;
use std::io::Read;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(author, version, about = "Sentinel Auditor - live agent trace viewer for security investigations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create .sentinel/ with a default config and database
    Init,

    /// Record the root audit event of a new investigation
    IngestRoot {
        /// JSON file with the audit payload, or - for stdin
        file: String,
    },

    /// Append one agent step to an investigation
    LogTrace {
        /// Investigation (root event) id
        event_id: String,
        /// Agent role (TRIGGER, TRIAGE, INTEL, JUDGE, CISO, ENFORCER, ...)
        role: String,
        /// Status (THINKING, SUCCESS, COMPLETED, FAILED, ...)
        status: String,
        /// Output payload as JSON
        #[arg(short, long, default_value = "{}")]
        output: String,
    },

    /// Print the laid-out graph of an investigation
    Graph {
        event_id: String,
        /// Emit the layout as JSON
        #[arg(long)]
        json: bool,
        /// Only lay out the first N events
        #[arg(long)]
        cursor: Option<usize>,
    },

    /// Replay an investigation step by step in the terminal
    Replay { event_id: String },

    /// List investigations, newest first
    List,

    /// Follow an investigation live in the TUI
    Watch { event_id: String },

    /// Start the HTTP API
    Serve {
        /// Port to listen on (default from config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let default_directive = match cli.command {
        Command::Watch { .. } => "sentinel=warn",
        _ => "sentinel=info",
    };
    init_logging(default_directive);

    if let Err(e) = run(cli.command) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();

    match command {
        Command::Init => {
            sentinel::init::init_project()?;
        }

        Command::IngestRoot { file } => {
            let raw = if file == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&file)?
            };
            let value: Value = serde_json::from_str(&raw)?;
            let payload = extract_payload(value).ok_or("payload has no event_id")?;
            let event_id = payload
                .get("event_id")
                .and_then(Value::as_str)
                .ok_or("event_id must be a string")?
                .to_string();

            let db = Database::open()?;
            db.record_audit_log(&event_id, &payload)?;
            println!("{} investigation {}", "Recorded".green(), event_id.cyan());
        }

        Command::LogTrace {
            event_id,
            role,
            status,
            output,
        } => {
            let output: Value = serde_json::from_str(&output)?;
            let role = AgentRole::parse(&role);
            let status = TraceStatus::parse(&status);
            if !role.is_known() {
                eprintln!("{} unknown role {}, placed in column 1", "Warning:".yellow(), role);
            }

            let db = Database::open()?;
            let id = db.log_trace(&event_id, &role, &status, &output)?;
            println!("{} trace #{} ({} {})", "Logged".green(), id, role, status);
        }

        Command::Graph {
            event_id,
            json,
            cursor,
        } => {
            let db = Database::open()?;
            let store = TraceStore::load(&db, &event_id)?;
            let visible = store.prefix(cursor.unwrap_or(store.len()));
            let graph = layout(Some(store.root()), visible, &config.grid());

            if json {
                println!("{}", serde_json::to_string_pretty(&graph)?);
            } else {
                for node in &graph.nodes {
                    print_node(node);
                }
                if visible.is_empty() {
                    println!("   {}", "Waiting for agents...".dimmed());
                }
                println!(
                    "\n{} nodes, {} edges ({} of {} events)",
                    graph.nodes.len(),
                    graph.edges.len(),
                    visible.len(),
                    store.len()
                );
            }
        }

        Command::Replay { event_id } => {
            let db = Database::open()?;
            let mut inv = Investigation::open(&db, &event_id, &config)?;
            replay_headless(&mut inv);
        }

        Command::List => {
            let db = Database::open()?;
            let investigations = db.list_investigations()?;
            if investigations.is_empty() {
                println!("No investigations recorded. Try {}", "sentinel ingest-root <file>".cyan());
            }
            for inv in investigations {
                println!(
                    "{:<36} {:>4} step(s)  {}",
                    inv.event_id.cyan(),
                    inv.trace_count,
                    inv.created_at.dimmed()
                );
            }
        }

        Command::Watch { event_id } => {
            let db = Database::open()?;
            sentinel::tui::run(&db, &event_id, &config)?;
        }

        Command::Serve { port } => {
            let db = Database::open()?;
            let port = port.unwrap_or(config.serve.port);
            sentinel::serve::start_api_server(db, config.grid(), port)?;
        }

        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "sentinel", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Reveal stored events one per interval, printing each as it appears
fn replay_headless(inv: &mut Investigation) {
    inv.update(Msg::StartReplay);
    let total = inv.replay().total().unwrap_or(0);
    println!(
        "{} {} step(s) every {}ms",
        "Replaying".cyan().bold(),
        total,
        inv.replay().interval().as_millis()
    );

    if let Some(root) = inv.graph().node(NodeId::Root) {
        print_node(root);
    }
    if total == 0 {
        println!("   {}", "Waiting for agents...".dimmed());
        return;
    }

    let mut shown = 0;
    while inv.is_replaying() {
        std::thread::sleep(inv.replay().interval());
        inv.update(Msg::Tick);
        let graph = inv.graph();
        for node in graph.nodes.iter().skip(shown + 1) {
            print_node(node);
        }
        shown = inv.visible_count();
    }
    println!("{}", "Replay complete".green());
}

fn print_node(node: &GraphNode) {
    let status = match &node.status {
        TraceStatus::Thinking => node.status.to_string().yellow(),
        TraceStatus::Success | TraceStatus::Completed => node.status.to_string().green(),
        TraceStatus::Failed => node.status.to_string().red(),
        TraceStatus::Other(s) => s.dimmed(),
    };
    let badge = match &node.badge {
        Some(b) => match b.tone {
            BadgeTone::Allow => format!(" [{}]", b.text).green().bold(),
            BadgeTone::Block | BadgeTone::Killed => format!(" [{}]", b.text).red().bold(),
        },
        None => "".normal(),
    };
    println!(
        "{:>10}  ({},{})  {:<16} {:<18} {:<10} {}{}",
        node.id.to_string().dimmed(),
        node.column,
        node.row,
        node.title.bold(),
        node.role.label().dimmed(),
        status,
        node.content,
        badge
    );
}
