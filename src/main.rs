//! CLI entry point for `mimetree`.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use mimetree::config::{self, Config};
use mimetree::export::attachment;
use mimetree::model::tree::PartSummary;
use mimetree::parser::eml;
use mimetree::Message;

#[derive(Parser)]
#[command(name = "mimetree", version, about = "Decode MIME messages into a part tree")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the main headers and a part overview
    Show {
        /// Message file (`-` for stdin)
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the MIME part tree
    Tree {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the renderable HTML body
    Html {
        path: PathBuf,
        /// Embed `cid:` images as data URIs
        #[arg(long)]
        inline_images: bool,
    },
    /// Print the plain-text body
    Text { path: PathBuf },
    /// Extract all attachments and inline files
    Attachments {
        path: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract the part with a given Content-ID
    Cid {
        path: PathBuf,
        content_id: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Show { path, json } => cmd_show(&load(&path, &config)?, json),
        Commands::Tree { path, json } => cmd_tree(&load(&path, &config)?, json),
        Commands::Html {
            path,
            inline_images,
        } => cmd_html(&load(&path, &config)?, inline_images),
        Commands::Text { path } => cmd_text(&load(&path, &config)?),
        Commands::Attachments { path, output } => {
            let output = output
                .or_else(|| config.export.default_output_dir.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            cmd_attachments(&load(&path, &config)?, &output, &config)
        }
        Commands::Cid {
            path,
            content_id,
            output,
        } => {
            let written = attachment::export_content_id(&load(&path, &config)?, &content_id, &output)?;
            println!("{}", written.display());
            Ok(())
        }
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mimetree.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Decode a message from a file, or from stdin when `path` is `-`.
fn load(path: &Path, config: &Config) -> anyhow::Result<Message> {
    if path == Path::new("-") {
        let mut data = Vec::new();
        std::io::stdin().read_to_end(&mut data)?;
        return Ok(eml::decode_payload(&data, &config.decoder)?);
    }
    Ok(eml::read_message(path, &config.decoder)?)
}

fn cmd_show(msg: &Message, json: bool) -> anyhow::Result<()> {
    let attachments = msg.attachments();

    if json {
        let value = serde_json::json!({
            "subject": msg.subject(),
            "from": msg.from(),
            "to": msg.to(),
            "date": msg.date().map(|d| d.to_rfc3339()),
            "message_id": msg.message_id(),
            "multipart": msg.is_multipart(),
            "parts": msg.root().iter().count(),
            "attachments": attachments,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Subject:     {}", msg.subject().unwrap_or("(none)"));
    println!("From:        {}", msg.from().unwrap_or("(none)"));
    println!("To:          {}", msg.to().unwrap_or("(none)"));
    if let Some(date) = msg.date() {
        println!("Date:        {}", date.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(id) = msg.message_id() {
        println!("Message-ID:  {id}");
    }
    println!("Parts:       {}", msg.root().iter().count());
    println!("Attachments: {}", attachments.len());
    for att in &attachments {
        use humansize::{format_size, BINARY};
        let inline = if att.is_inline { " (inline)" } else { "" };
        println!(
            "  - {} [{}] {}{}",
            att.filename,
            att.content_type,
            format_size(att.size, BINARY),
            inline
        );
    }
    Ok(())
}

fn cmd_tree(msg: &Message, json: bool) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let summary = PartSummary::from_part(msg.root());
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    for (depth, node) in summary.flatten() {
        let label = if node.path.is_empty() { "root" } else { node.path.as_str() };
        let mut line = format!(
            "{}{} {} ({})",
            "  ".repeat(depth),
            label,
            node.mime_type,
            format_size(node.size, BINARY)
        );
        if let Some(name) = &node.filename {
            line.push_str(&format!(" name={name}"));
        }
        if let Some(cid) = &node.content_id {
            line.push_str(&format!(" cid={cid}"));
        }
        println!("{line}");
    }
    Ok(())
}

fn cmd_html(msg: &Message, inline_images: bool) -> anyhow::Result<()> {
    let html = if inline_images {
        msg.html_body_with_inline_images()
    } else {
        msg.html_body()
    };
    match html {
        Some(html) => {
            println!("{html}");
            Ok(())
        }
        None => anyhow::bail!("Message has no HTML or plain-text body"),
    }
}

fn cmd_text(msg: &Message) -> anyhow::Result<()> {
    match msg.plain_body() {
        Some(text) => {
            println!("{text}");
            Ok(())
        }
        None => anyhow::bail!("Message has no plain-text body"),
    }
}

fn cmd_attachments(msg: &Message, output: &Path, config: &Config) -> anyhow::Result<()> {
    let paths =
        attachment::export_all_attachments(msg, output, config.export.max_filename_len)?;
    for path in &paths {
        println!("{}", path.display());
    }
    eprintln!("{} file(s) written to {}", paths.len(), output.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mimetree", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
