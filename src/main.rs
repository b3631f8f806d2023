//! autocrud CLI: serve JSON collections as CRUD endpoints and manipulate
//! collection files.

use autocrud::tools::{merge_records, schema_report, summarize, to_yaml, validate_records, write_chunks};
use autocrud::{read_records, write_records, Response, Router};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::json;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::Filter;

/// HTTP binding for the `serve` command.
#[derive(Clone, Debug)]
struct ServeConfig {
    host: IpAddr,
    port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
        }
    }
}

impl ServeConfig {
    fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn file_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help(help)
}

fn build_cli() -> Command {
    Command::new("autocrud")
        .version(env!("CARGO_PKG_VERSION"))
        .about("CRUD endpoints and utilities for JSON record collections")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level unless RUST_LOG is set"),
        )
        .subcommand(
            Command::new("validate")
                .about("Check that every record matches the shape of the first")
                .arg(file_arg("file", "Collection file"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("summary")
                .about("Record count and per-field value frequencies")
                .arg(file_arg("file", "Collection file"))
                .arg(
                    Arg::new("top")
                        .long("top")
                        .default_value("5")
                        .value_parser(value_parser!(usize))
                        .help("Most frequent values to list per field"),
                ),
        )
        .subcommand(
            Command::new("schema")
                .about("Print the schema inferred from the first record")
                .arg(file_arg("file", "Collection file")),
        )
        .subcommand(
            Command::new("merge")
                .about("Concatenate two collections, skipping duplicate ids")
                .arg(file_arg("first", "First collection file"))
                .arg(file_arg("second", "Second collection file"))
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Merged collection file"),
                ),
        )
        .subcommand(
            Command::new("split")
                .about("Split a collection into fixed-size chunk files")
                .arg(file_arg("file", "Collection file"))
                .arg(
                    Arg::new("size")
                        .long("size")
                        .required(true)
                        .value_parser(value_parser!(NonZeroUsize))
                        .help("Records per chunk"),
                )
                .arg(
                    Arg::new("out-dir")
                        .long("out-dir")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory for chunk files (defaults to the file's directory)"),
                ),
        )
        .subcommand(
            Command::new("to-yaml")
                .about("Convert a collection to YAML")
                .arg(file_arg("file", "Collection file"))
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Output file (stdout if omitted)"),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve collections over HTTP")
                .arg(
                    Arg::new("files")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf))
                        .help("Collection files; each is served under its file stem"),
                )
                .arg(
                    Arg::new("host")
                        .long("host")
                        .value_parser(value_parser!(IpAddr))
                        .help("Address to bind (default 127.0.0.1)"),
                )
                .arg(
                    Arg::new("port")
                        .long("port")
                        .value_parser(value_parser!(u16))
                        .help("Port to bind (default 8000)"),
                ),
        )
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let matches = build_cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    let code = match run(&matches) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(code);
}

fn path_arg<'a>(args: &'a ArgMatches, name: &str) -> &'a Path {
    args.get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .unwrap_or_else(|| Path::new(""))
}

fn run(matches: &ArgMatches) -> autocrud::Result<i32> {
    match matches.subcommand() {
        Some(("validate", args)) => {
            let file = path_arg(args, "file");
            let records = read_records(file)?;
            let report = validate_records(&records);

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for issue in &report.issues {
                    println!("{}", issue);
                }
                if report.is_valid() {
                    println!("{}: {} records, valid", file.display(), report.records);
                } else {
                    println!(
                        "{}: {} records, {} issues",
                        file.display(),
                        report.records,
                        report.issues.len()
                    );
                }
            }

            Ok(if report.is_valid() { 0 } else { 1 })
        }

        Some(("summary", args)) => {
            let records = read_records(path_arg(args, "file"))?;
            let top = args.get_one::<usize>("top").copied().unwrap_or(5);
            println!("{}", serde_json::to_string_pretty(&summarize(&records, top))?);
            Ok(0)
        }

        Some(("schema", args)) => {
            let records = read_records(path_arg(args, "file"))?;
            println!("{}", serde_json::to_string_pretty(&schema_report(&records))?);
            Ok(0)
        }

        Some(("merge", args)) => {
            let first = read_records(path_arg(args, "first"))?;
            let second = read_records(path_arg(args, "second"))?;
            let output = path_arg(args, "output");

            let outcome = merge_records(first, second);
            write_records(output, &outcome.records, true)?;

            println!(
                "Merged {} records into {} ({} duplicate ids skipped)",
                outcome.records.len(),
                output.display(),
                outcome.skipped.len()
            );
            Ok(0)
        }

        Some(("split", args)) => {
            let file = path_arg(args, "file");
            let records = read_records(file)?;
            let size = match args.get_one::<NonZeroUsize>("size") {
                Some(size) => *size,
                None => return Ok(2),
            };
            let out_dir = match args.get_one::<PathBuf>("out-dir") {
                Some(dir) => dir.clone(),
                None => file
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")),
            };

            for path in write_chunks(file, &records, size, &out_dir)? {
                println!("{}", path.display());
            }
            Ok(0)
        }

        Some(("to-yaml", args)) => {
            let records = read_records(path_arg(args, "file"))?;
            let yaml = to_yaml(&records)?;

            match args.get_one::<PathBuf>("output") {
                Some(output) => {
                    fs::write(output, yaml)?;
                    info!(output = %output.display(), "wrote YAML");
                }
                None => print!("{}", yaml),
            }
            Ok(0)
        }

        Some(("serve", args)) => {
            let files: Vec<PathBuf> = args
                .get_many::<PathBuf>("files")
                .map(|files| files.cloned().collect())
                .unwrap_or_default();

            let mut config = ServeConfig::default();
            if let Some(host) = args.get_one::<IpAddr>("host") {
                config.host = *host;
            }
            if let Some(port) = args.get_one::<u16>("port") {
                config.port = *port;
            }

            serve(files, config)?;
            Ok(0)
        }

        _ => Ok(2),
    }
}

/// HTTP filter dispatching every request to `router`.
///
/// Store access blocks, so each request runs on the blocking pool.
fn http_routes(
    router: Arc<Router>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::any()
        .and(warp::method())
        .and(warp::path::full())
        .and(warp::body::bytes())
        .and_then(
            move |method: warp::http::Method, path: warp::path::FullPath, body: Bytes| {
                let router = Arc::clone(&router);
                async move {
                    let response = tokio::task::spawn_blocking(move || {
                        router.handle(method.as_str(), path.as_str(), &body)
                    })
                    .await
                    .unwrap_or_else(|e| {
                        error!(error = %e, "request handler panicked");
                        Response {
                            status: 500,
                            body: json!({ "detail": "internal error" }),
                        }
                    });

                    let status = StatusCode::from_u16(response.status)
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                    Ok::<_, warp::Rejection>(warp::reply::with_status(
                        warp::reply::json(&response.body),
                        status,
                    ))
                }
            },
        )
}

/// Bind the router to HTTP and run until the process is stopped.
fn serve(files: Vec<PathBuf>, config: ServeConfig) -> autocrud::Result<()> {
    let router = Arc::new(Router::from_paths(files)?);
    let names: Vec<String> = router.names().map(str::to_string).collect();
    let addr = config.addr();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        info!(%addr, collections = ?names, "serving collections");
        warp::serve(http_routes(router)).run(addr).await;
    });

    Ok(())
}
