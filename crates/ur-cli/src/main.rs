//! User Rules CLI
//!
//! CLI tool for creating, removing, listing and querying user rules stored
//! in a rule file.

mod format;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use log::info;

use ur_core::{build_filter, ContentRequest, EngineConfig, Filter, Response, UserRules};
use ur_store::JsonFileRepository;

use crate::format::{describe_filter, parse_content_types};

#[derive(Parser)]
#[command(name = "ur-cli")]
#[command(about = "Per-site block/allow rules: manage and query a rule file")]
struct Cli {
    /// Rule file
    #[arg(short, long, global = true, default_value = "user-rules.json")]
    rules: PathBuf,

    /// Let rules for a parent domain apply on its subdomains
    #[arg(long, global = true)]
    subdomain_fallback: bool,

    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RuleArgs {
    /// Page domain the rule is tied to (omit for a global rule)
    #[arg(short, long, default_value = "")]
    page: String,

    /// Request domain the rule applies to (omit for any domain)
    #[arg(short = 'd', long, default_value = "")]
    request: String,

    /// Content types, comma separated (script,image,... or all)
    #[arg(short = 't', long = "type", default_value = "all")]
    content_type: String,

    /// Only third-party requests (default: only first-party)
    #[arg(long)]
    third_party: bool,

    /// Allow instead of block
    #[arg(long)]
    allow: bool,
}

impl RuleArgs {
    fn build(&self) -> Result<Filter, String> {
        let response = if self.allow { Response::Allow } else { Response::Block };
        build_filter(
            &self.page,
            &self.request,
            parse_content_types(&self.content_type)?,
            self.third_party,
            response,
        )
        .map_err(|e| e.to_string())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add a rule
    Add(RuleArgs),

    /// Remove a rule (same arguments it was added with)
    Remove(RuleArgs),

    /// List rules
    List {
        /// Only rules of this page domain ("" for global rules)
        #[arg(short, long)]
        scope: Option<String>,
    },

    /// Decide a single request
    Query {
        /// Page host
        #[arg(short, long)]
        page: String,

        /// Request host
        #[arg(short = 'd', long)]
        request: String,

        /// Content type of the request
        #[arg(short = 't', long = "type")]
        content_type: String,

        /// Treat the request as third-party (default: derived from the hosts)
        #[arg(long, conflicts_with = "first_party")]
        third_party: bool,

        /// Treat the request as first-party (default: derived from the hosts)
        #[arg(long)]
        first_party: bool,
    },

    /// Turn filtering off on a site
    AllowPage {
        /// Page domain
        host: String,
    },

    /// Turn filtering back on for a site
    DisallowPage {
        /// Page domain
        host: String,
    },

    /// Check whether a page URL is allowed to load
    Check {
        /// Page URL
        url: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let result = open_engine(&cli.rules, cli.subdomain_fallback).and_then(|rules| match cli.command {
        Commands::Add(args) => cmd_add(&rules, &args),
        Commands::Remove(args) => cmd_remove(&rules, &args),
        Commands::List { scope } => cmd_list(&rules, scope.as_deref()),
        Commands::Query {
            page,
            request,
            content_type,
            third_party,
            first_party,
        } => {
            let is_third_party = party_relation(&page, &request, third_party, first_party);
            cmd_query(&rules, &page, &request, &content_type, is_third_party)
        }
        Commands::AllowPage { host } => cmd_allow_page(&rules, &host),
        Commands::DisallowPage { host } => cmd_disallow_page(&rules, &host),
        Commands::Check { url } => cmd_check(&rules, &url),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(level: Option<&str>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder.init();
}

type Engine = UserRules<JsonFileRepository>;

fn open_engine(path: &Path, subdomain_fallback: bool) -> Result<Engine, String> {
    let start = Instant::now();
    let repo = JsonFileRepository::open(path).map_err(|e| e.to_string())?;
    let config = EngineConfig::default().with_subdomain_fallback(subdomain_fallback);
    let rules = UserRules::load(repo, config).map_err(|e| e.to_string())?;
    info!(
        "loaded {} rules from '{}' in {:.1}ms",
        rules.len(),
        path.display(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(rules)
}

fn cmd_add(rules: &Engine, args: &RuleArgs) -> Result<(), String> {
    let filter = args.build()?;
    let line = describe_filter(&filter);
    if rules.add_user_rule(filter).map_err(|e| e.to_string())? {
        println!("Added: {line}");
    } else {
        println!("Already present: {line}");
    }
    Ok(())
}

fn cmd_remove(rules: &Engine, args: &RuleArgs) -> Result<(), String> {
    let filter = args.build()?;
    let line = describe_filter(&filter);
    if rules.remove_user_rule(&filter).map_err(|e| e.to_string())? {
        println!("Removed: {line}");
    } else {
        println!("Not found: {line}");
    }
    Ok(())
}

fn cmd_list(rules: &Engine, scope: Option<&str>) -> Result<(), String> {
    let groups = match scope {
        Some(scope) => vec![(scope.to_string(), rules.rules_for_scope(scope))],
        None => rules.rules(),
    };

    for (scope, filters) in groups {
        let title = if scope.is_empty() { "(global)" } else { scope.as_str() };
        println!("{title}:");
        for filter in &filters {
            println!("  {}", describe_filter(filter));
        }
    }
    println!("Total: {} rules", rules.len());
    Ok(())
}

fn cmd_query(
    rules: &Engine,
    page: &str,
    request: &str,
    content_type: &str,
    is_third_party: bool,
) -> Result<(), String> {
    let content_type = parse_content_types(content_type)?;
    if content_type.bits().count_ones() != 1 {
        return Err("A request has exactly one content type".to_string());
    }
    let decision = rules.get_response(&ContentRequest::new(page, request, content_type, is_third_party));
    println!("{}", decision.as_str());
    Ok(())
}

/// Third-party flag of a queried request: an explicit flag wins, otherwise
/// the hosts are compared.
fn party_relation(page: &str, request: &str, third_party: bool, first_party: bool) -> bool {
    if third_party || first_party {
        third_party
    } else {
        !page.eq_ignore_ascii_case(request)
    }
}

fn cmd_allow_page(rules: &Engine, host: &str) -> Result<(), String> {
    if rules.allow_page(host).map_err(|e| e.to_string())? {
        println!("Filtering disabled on {host}");
    } else {
        println!("Filtering already disabled on {host}");
    }
    Ok(())
}

fn cmd_disallow_page(rules: &Engine, host: &str) -> Result<(), String> {
    if rules.disallow_page(host).map_err(|e| e.to_string())? {
        println!("Filtering enabled on {host}");
    } else {
        println!("Filtering was not disabled on {host}");
    }
    Ok(())
}

fn cmd_check(rules: &Engine, url: &str) -> Result<(), String> {
    let verdict = if rules.is_allowed(url) { "allowed" } else { "blocked" };
    println!("{url}: {verdict}");
    Ok(())
}
