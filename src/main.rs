//! Interactive shell for running rule queries against a JSON dataset.
//!
//! Commands:
//!   :load <file>       - Load a dataset
//!   :config <file>     - Load an engine configuration
//!   :workspace <id>    - Select the workspace searched for revisions
//!   :instance <serial> - Select the product instance searched for path data
//!   :sql               - Toggle printing the rendered SQL
//!   :help              - Show help
//!   :quit              - Exit
//!
//! Any other line is parsed as a JSON query and run.

use anyhow::{bail, Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tracing::{info, warn};

use rule_dispatcher::{
    EngineConfig, InMemorySource, PathDataQueryEngine, Query, RevisionQueryEngine, SqlCompiler,
};

const PROMPT: &str = "rules> ";
const CONFIG_FILE: &str = "engine_config.json";

struct Session {
    config: EngineConfig,
    source: InMemorySource,
    workspace: String,
    instance: Option<String>,
    show_sql: bool,
}

impl Session {
    fn new() -> Self {
        let config = match EngineConfig::from_json_file(CONFIG_FILE) {
            Ok(config) => {
                info!(file = CONFIG_FILE, "loaded engine configuration");
                config
            }
            Err(e) => {
                warn!(error = %e, "using default engine configuration");
                EngineConfig::default()
            }
        };

        Self {
            config,
            source: InMemorySource::default(),
            workspace: String::new(),
            instance: None,
            show_sql: false,
        }
    }

    /// Returns false once the session should end.
    fn handle_line(&mut self, line: &str) -> Result<bool> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(true);
        }

        let Some(command) = line.strip_prefix(':') else {
            self.run_query(line)?;
            return Ok(true);
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match name {
            "quit" | "q" => return Ok(false),
            "help" | "h" => print_help(),
            "load" => {
                self.source = InMemorySource::from_json_file(arg)
                    .map_err(|e| anyhow::anyhow!(e))
                    .with_context(|| format!("cannot load dataset `{}`", arg))?;
                println!(
                    "{} revisions, {} path data, {} product instances",
                    self.source.revisions.len(),
                    self.source.path_data.len(),
                    self.source.product_instances.len()
                );
            }
            "config" => {
                self.config = EngineConfig::from_json_file(arg)?;
                println!("configuration loaded from {}", arg);
            }
            "workspace" => {
                self.workspace = arg.to_string();
                println!("workspace: {}", self.workspace);
            }
            "instance" => {
                self.instance = (!arg.is_empty()).then(|| arg.to_string());
                println!("instance: {}", self.instance.as_deref().unwrap_or("<none>"));
            }
            "sql" => {
                self.show_sql = !self.show_sql;
                println!("sql output {}", if self.show_sql { "on" } else { "off" });
            }
            other => bail!("unknown command `:{}`, try :help", other),
        }
        Ok(true)
    }

    fn run_query(&self, json: &str) -> Result<()> {
        let query = Query::from_json(json).context("invalid query JSON")?;

        let revisions =
            RevisionQueryEngine::new(&self.source, &self.config).search(&query, &self.workspace)?;
        println!("[revisions] {} match", revisions.len());
        for key in &revisions {
            println!("  {}", key);
        }

        let compiler = SqlCompiler::from_config(self.config.clone());
        if self.show_sql {
            let result = compiler.compile_revision_query(&query, &self.workspace)?;
            println!("{}", result.sql);
            for optimization in &result.optimizations {
                println!("  • {:?}", optimization);
            }
        }

        let Some(serial) = &self.instance else {
            return Ok(());
        };
        let Some(instance) = self.source.product_instance(serial) else {
            bail!("no product instance with serial number `{}`", serial);
        };

        let paths = PathDataQueryEngine::new(&self.source, &self.config).search(&query, instance)?;
        println!("[path data] {} match", paths.len());
        for path in &paths {
            println!("  {}", path);
        }

        if self.show_sql {
            match compiler.compile_path_data_query(&query, instance)? {
                Some(result) => println!("{}", result.sql),
                None => println!("(no path data attached, nothing to query)"),
            }
        }
        Ok(())
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :load <file>        Load a dataset (revisions, pathData, productInstances)");
    println!("  :config <file>      Load an engine configuration");
    println!("  :workspace <id>     Select the workspace searched for revisions");
    println!("  :instance <serial>  Select the product instance searched for path data");
    println!("  :sql                Toggle printing the rendered SQL");
    println!("  :quit               Exit");
    println!();
    println!("Any other input is a JSON query, for example:");
    println!(r#"  {{"queryRule": {{"field": "pm.number", "operator": "begins_with", "#);
    println!(r#"                  "values": ["P-"], "type": "string"}}}}"#);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    println!("rule_dispatcher v{}", env!("CARGO_PKG_VERSION"));
    println!("Type :help for help, :quit to exit\n");

    let mut session = Session::new();
    for path in std::env::args().skip(1) {
        session.handle_line(&format!(":load {}", path))?;
    }

    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => match session.handle_line(&line) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => eprintln!("error: {:#}", e),
            },
            Err(ReadlineError::Interrupted) => println!("Use :quit or Ctrl-D to exit"),
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
