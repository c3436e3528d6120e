//! Command-line interface for nodesel
//! This binary compiles selector queries, matches them against candidate pools and waits for
//! network members to fill (or leave) the selector slots.
//!
//! Usage:
//!   nodesel tokens `<query>` -f `<field>`...                 - Dump the token stream
//!   nodesel check `<query>` -f `<field>`...                  - Print each compiled selector
//!   nodesel match `<query>` --pool `<file>` [-f `<field>`...] - One assignment pass over a pool
//!   nodesel wait `<query>` --members `<file>` --network `<file>` - Poll until slots are filled
//!                                                               (and `--ip` addresses assigned)

mod commands;

use clap::{Arg, ArgAction, ArgMatches, Command};
use commands::{CliError, OutputFormat, WaitArgs};
use nodesel_config::WaitOverrides;

fn field_arg() -> Arg {
    Arg::new("field")
        .long("field")
        .short('f')
        .help("Field name a query may reference (repeatable)")
        .action(ArgAction::Append)
}

fn query_arg() -> Arg {
    Arg::new("query")
        .help("Selector query, e.g. '[name^=web] AND NOT [tag:role=db]'")
        .required(true)
        .index(1)
}

fn format_arg() -> Arg {
    Arg::new("format")
        .long("format")
        .help("Output format")
        .value_parser(["json", "yaml"])
        .default_value("json")
}

fn build_cli() -> Command {
    Command::new("nodesel")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compile node selector queries and wait for matching network members")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("tokens")
                .about("Print the token stream of a query")
                .arg(query_arg())
                .arg(field_arg())
                .arg(format_arg()),
        )
        .subcommand(
            Command::new("check")
                .about("Compile a query and print each selector in canonical form")
                .arg(query_arg())
                .arg(field_arg()),
        )
        .subcommand(
            Command::new("match")
                .about("Assign candidates from a JSON pool to the selectors of a query")
                .arg(query_arg())
                .arg(field_arg())
                .arg(
                    Arg::new("pool")
                        .long("pool")
                        .help("JSON array of flat attribute objects")
                        .required(true),
                )
                .arg(format_arg()),
        )
        .subcommand(
            Command::new("wait")
                .about("Poll a member snapshot until every selector slot is filled")
                .arg(query_arg())
                .arg(
                    Arg::new("members")
                        .long("members")
                        .help("Member list JSON, re-read on every pass")
                        .required(true),
                )
                .arg(
                    Arg::new("network")
                        .long("network")
                        .help("Network JSON naming capabilities and tags")
                        .required(true),
                )
                .arg(
                    Arg::new("self-id")
                        .long("self-id")
                        .help("Node id of this machine; never a candidate"),
                )
                .arg(
                    Arg::new("ip")
                        .long("ip")
                        .help("Address this machine must be assigned before the wait ends (repeatable)")
                        .action(ArgAction::Append)
                        .requires("self-id"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .help("Configuration file layered over the built-in defaults"),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .help("Seconds to wait; 0 waits forever, a trailing '?' makes it non-fatal"),
                )
                .arg(
                    Arg::new("interval-ms")
                        .long("interval-ms")
                        .help("Delay between polling passes in milliseconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("unavailable")
                        .long("unavailable")
                        .help("Wait until no selector matches anyone instead")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("ip-version")
                        .long("ip-version")
                        .help("Address family to report: 4, 6, 4? or 6?"),
                ),
        )
}

fn fields_of(matches: &ArgMatches) -> Vec<String> {
    matches
        .get_many::<String>("field")
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn query_of(matches: &ArgMatches) -> &str {
    matches
        .get_one::<String>("query")
        .map(String::as_str)
        .unwrap_or_default()
}

fn format_of(matches: &ArgMatches) -> OutputFormat {
    match matches.get_one::<String>("format").map(String::as_str) {
        Some("yaml") => OutputFormat::Yaml,
        _ => OutputFormat::Json,
    }
}

fn main() {
    let matches = build_cli().get_matches();

    let result = match matches.subcommand() {
        Some(("tokens", sub)) => {
            commands::tokens(query_of(sub), &fields_of(sub), format_of(sub))
        }
        Some(("check", sub)) => commands::check(query_of(sub), &fields_of(sub)),
        Some(("match", sub)) => {
            let pool = sub.get_one::<String>("pool").cloned().unwrap_or_default();
            commands::match_pool(query_of(sub), &fields_of(sub), &pool, format_of(sub))
        }
        Some(("wait", sub)) => {
            let args = WaitArgs {
                query: query_of(sub).to_string(),
                members: sub.get_one::<String>("members").cloned().unwrap_or_default(),
                network: sub.get_one::<String>("network").cloned().unwrap_or_default(),
                self_id: sub.get_one::<String>("self-id").cloned(),
                ip: sub
                    .get_many::<String>("ip")
                    .map(|values| values.cloned().collect())
                    .unwrap_or_default(),
                config: sub.get_one::<String>("config").cloned(),
                overrides: WaitOverrides {
                    timeout: sub.get_one::<String>("timeout").cloned(),
                    interval_ms: sub.get_one::<u64>("interval-ms").copied(),
                    unavailable: sub.get_flag("unavailable"),
                    ip_version: sub.get_one::<String>("ip-version").cloned(),
                },
            };
            commands::wait(args)
        }
        _ => Ok(()),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        std::process::exit(err.exit_code());
    }
}
