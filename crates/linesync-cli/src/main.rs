//! linesync CLI Client
//!
//! Interactive command-line client for linesync servers.
//!
//! # Usage
//!
//! ```bash
//! # Connect to local server
//! linesync
//!
//! # Connect to remote server
//! linesync --host example.com --port 7380
//!
//! # Execute single command
//! linesync -c "CONTENT notes:1"
//! ```

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// linesync Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "linesync")]
#[command(author, version, about = "linesync CLI - collaborative plain-text editing client")]
struct Args {
    /// Server hostname
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "LINESYNC_HOST")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "7380", env = "LINESYNC_PORT")]
    port: u16,

    /// Password for authentication
    #[arg(short = 'a', long, env = "LINESYNC_PASSWORD")]
    password: Option<String>,

    /// Execute command and exit
    #[arg(short, long)]
    command: Option<String>,

    /// Quiet mode (no banner)
    #[arg(short, long)]
    quiet: bool,
}

/// A decoded server reply
#[derive(Debug, PartialEq)]
enum Reply {
    Status(String),
    Error(String),
    Integer(i64),
    Bulk(String),
    Array(Vec<Reply>),
}

struct Connection {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Connection {
    fn open(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .with_context(|| format!("Failed to connect to {}", addr))?;
        stream.set_read_timeout(Some(std::time::Duration::from_secs(5)))?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
        })
    }

    fn send(&mut self, cmd: &str) -> Result<Reply> {
        write!(self.writer, "{}\r\n", cmd)?;
        self.writer.flush()?;
        read_reply(&mut self.reader)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let addr = format!("{}:{}", args.host, args.port);

    // Connect
    let mut conn = Connection::open(&addr)?;

    // Authenticate if password provided
    if let Some(ref password) = args.password {
        if let Reply::Error(e) = conn.send(&format!("AUTH {}", password))? {
            bail!("Authentication failed: {}", e);
        }
        if !args.quiet {
            println!("{}", "Authenticated.".green());
        }
    }

    // Single command mode
    if let Some(cmd) = args.command {
        let reply = conn.send(&cmd)?;
        print_reply(&reply, 0);
        if matches!(reply, Reply::Error(_)) {
            std::process::exit(1);
        }
        return Ok(());
    }

    if !args.quiet {
        let auth_status = if args.password.is_some() { " (authenticated)" } else { "" };
        println!(
            "{}",
            format!(
                r#"
  ╦  ╦╔╗╔╔═╗╔═╗╦ ╦╔╗╔╔═╗  CLI
  ║  ║║║║║╣ ╚═╗╚╦╝║║║║    Connected to {}{}
  ╩═╝╩╝╚╝╚═╝╚═╝ ╩ ╝╚╝╚═╝  Type 'help' for commands, 'quit' to exit
"#,
                addr, auth_status
            )
            .cyan()
        );
    }

    // Interactive mode
    let mut rl = DefaultEditor::new()?;
    let history_path = dirs_next::home_dir()
        .map(|p| p.join(".linesync_history"))
        .unwrap_or_default();

    let _ = rl.load_history(&history_path);

    loop {
        let prompt = format!("{}> ", "linesync".green());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Handle local commands
                match line.to_uppercase().as_str() {
                    "QUIT" | "EXIT" => {
                        let _ = conn.send("QUIT");
                        break;
                    }
                    "HELP" => {
                        print_help();
                        continue;
                    }
                    "CLEAR" => {
                        print!("\x1B[2J\x1B[1;1H");
                        continue;
                    }
                    _ => {}
                }

                // Execute remote command
                match conn.send(line) {
                    Ok(reply) => print_reply(&reply, 0),
                    Err(e) => {
                        eprintln!("{} {}", "Error:".red(), e);

                        // Try to reconnect
                        match Connection::open(&addr) {
                            Ok(new_conn) => {
                                conn = new_conn;
                                println!("{}", "Reconnected.".yellow());
                            }
                            Err(_) => {
                                eprintln!("{}", "Connection lost.".red());
                                break;
                            }
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(())
}

fn read_line(reader: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        bail!("Connection closed by server");
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn read_reply(reader: &mut impl BufRead) -> Result<Reply> {
    let line = read_line(reader)?;

    let (kind, rest) = match line.chars().next() {
        Some(kind) => (kind, &line[kind.len_utf8()..]),
        None => bail!("Empty reply"),
    };

    match kind {
        '+' => Ok(Reply::Status(rest.to_string())),
        '-' => Ok(Reply::Error(rest.to_string())),
        ':' => Ok(Reply::Integer(rest.parse().context("Malformed integer reply")?)),
        '$' => {
            let len: usize = rest.parse().context("Malformed bulk length")?;
            // Payload plus trailing \r\n
            let mut data = vec![0u8; len + 2];
            reader.read_exact(&mut data)?;
            data.truncate(len);
            Ok(Reply::Bulk(String::from_utf8(data).context("Bulk reply is not UTF-8")?))
        }
        '*' => {
            let count: usize = rest.parse().context("Malformed array length")?;
            let items = (0..count)
                .map(|_| read_reply(reader))
                .collect::<Result<Vec<_>>>()?;
            Ok(Reply::Array(items))
        }
        _ => bail!("Unexpected reply: {}", line),
    }
}

fn print_reply(reply: &Reply, indent: usize) {
    let pad = " ".repeat(indent);
    match reply {
        Reply::Status(status) => println!("{}{}", pad, status.green()),
        Reply::Error(e) => println!("{}{}", pad, e.red()),
        Reply::Integer(n) => println!("{}{}", pad, n.to_string().yellow()),
        Reply::Bulk(data) => println!("{}{}", pad, render_bulk(data)),
        Reply::Array(items) if items.is_empty() => println!("{}{}", pad, "(empty)".dimmed()),
        Reply::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                print!("{}{}) ", pad, i + 1);
                match item {
                    Reply::Array(_) => {
                        println!();
                        print_reply(item, indent + 3);
                    }
                    _ => print_reply(item, 0),
                }
            }
        }
    }
}

/// Show document content as text, other JSON pretty-printed
fn render_bulk(data: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(value) => match (value.get("revision"), value.get("content")) {
            (Some(revision), Some(serde_json::Value::String(content))) => {
                format!("{}\n{}", format!("(revision {})", revision).dimmed(), content)
            }
            _ => serde_json::to_string_pretty(&value).unwrap_or_else(|_| data.to_string()),
        },
        Err(_) => data.to_string(),
    }
}

fn print_help() {
    println!(
        r#"
{}

{}
  AUTH <password>                        Authenticate with server

{}
  CREATE <id>                            Create an empty document
  PATCH <id> <patch-json>                Submit a patch, prints the new revision
  CONTENT <id>                           Show current revision and text
  DIFF <id> <revision>                   Show commits made after a revision
  KEYS [pattern]                         List document IDs

{}
  PING                                   Check connection
  INFO                                   Server information
  QUIT                                   Close connection

{}
  help                                   Show this help
  clear                                  Clear screen
  quit/exit                              Exit CLI

{}
  {{"id":"p1","baseRevision":0,"operations":[
    {{"type":"insert-line","lineIndex":1}},
    {{"type":"change-line","lineIndex":1,
     "operation":{{"type":"insert-text","column":0,"text":"Hello"}}}}]}}
"#,
        "linesync Commands".cyan().bold(),
        "Authentication".yellow().bold(),
        "Documents".yellow().bold(),
        "Server".yellow().bold(),
        "Local".yellow().bold(),
        "Patch format".yellow().bold(),
    );
}

// Minimal dirs_next replacement for home directory
mod dirs_next {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }
}
