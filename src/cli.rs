// src/cli.rs
use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::{env, path::PathBuf, process::ExitCode};

use crate::infra::t;

pub mod commands;

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` argument.
fn pre_parse_language() -> String {
    let args: Vec<String> = env::args().collect();
    if let Some(pos) = args.iter().position(|arg| arg == "--lang") {
        if let Some(lang) = args.get(pos + 1) {
            return lang.clone();
        }
    }
    // Fallback to system language detection
    sys_locale::get_locale().unwrap_or_else(|| "en".to_string())
}

fn build_cli(locale: &str) -> Command {
    Command::new("fleet-runner")
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli_about", locale = locale).to_string())
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help(t!("cli_config", locale = locale).to_string())
                .value_name("CONFIG")
                .default_value("Harness.toml")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cmd_init_about", locale = locale).to_string())
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help("Create a default config file without launching the interactive wizard.")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("build")
                .about(t!("cmd_build_about", locale = locale).to_string())
                .arg(
                    Arg::new("workers")
                        .short('j')
                        .long("workers")
                        .help(t!("arg_workers", locale = locale).to_string())
                        .value_name("WORKERS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("split")
                        .long("split")
                        .help(t!("arg_split", locale = locale).to_string())
                        .value_name("SPLIT")
                        .default_value("all")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("rebuild")
                        .long("rebuild")
                        .help(t!("arg_rebuild", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .help(t!("arg_verbose", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("test")
                .about(t!("cmd_test_about", locale = locale).to_string())
                .arg(
                    Arg::new("repo")
                        .help(t!("arg_repo", locale = locale).to_string())
                        .value_name("REPO")
                        .required(true)
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("test-ids")
                        .help(t!("arg_test_ids", locale = locale).to_string())
                        .value_name("TEST_IDS")
                        .num_args(0..)
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("branch")
                        .short('b')
                        .long("branch")
                        .help(t!("arg_branch", locale = locale).to_string())
                        .value_name("BRANCH")
                        .conflicts_with("reference")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("reference")
                        .long("reference")
                        .help(t!("arg_reference", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("backend")
                        .long("backend")
                        .help(t!("arg_backend", locale = locale).to_string())
                        .value_name("BACKEND")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .help(t!("arg_timeout", locale = locale).to_string())
                        .value_name("SECONDS")
                        .default_value("1800")
                        .value_parser(clap::value_parser!(u64))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("cpus")
                        .long("cpus")
                        .help(t!("arg_cpus", locale = locale).to_string())
                        .value_name("CPUS")
                        .default_value("1")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("coverage")
                        .long("coverage")
                        .help(t!("arg_coverage", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("rebuild")
                        .long("rebuild")
                        .help(t!("arg_rebuild", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("evaluate")
                .about(t!("cmd_evaluate_about", locale = locale).to_string())
                .arg(
                    Arg::new("split")
                        .long("split")
                        .help(t!("arg_split", locale = locale).to_string())
                        .value_name("SPLIT")
                        .default_value("all")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("branch")
                        .short('b')
                        .long("branch")
                        .help(t!("arg_branch", locale = locale).to_string())
                        .value_name("BRANCH")
                        .conflicts_with("reference")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("reference")
                        .long("reference")
                        .help(t!("arg_reference", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("backend")
                        .long("backend")
                        .help(t!("arg_backend", locale = locale).to_string())
                        .value_name("BACKEND")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .help(t!("arg_timeout", locale = locale).to_string())
                        .value_name("SECONDS")
                        .default_value("1800")
                        .value_parser(clap::value_parser!(u64))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("cpus")
                        .long("cpus")
                        .help(t!("arg_cpus", locale = locale).to_string())
                        .value_name("CPUS")
                        .default_value("1")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("workers")
                        .short('j')
                        .long("workers")
                        .help(t!("arg_workers", locale = locale).to_string())
                        .value_name("WORKERS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("coverage")
                        .long("coverage")
                        .help(t!("arg_coverage", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("rebuild")
                        .long("rebuild")
                        .help(t!("arg_rebuild", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help(t!("arg_json", locale = locale).to_string())
                        .value_name("JSON")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help(t!("arg_html", locale = locale).to_string())
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .help(t!("arg_strict", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("get-tests")
                .about(t!("cmd_get_tests_about", locale = locale).to_string())
                .arg(
                    Arg::new("repo")
                        .help(t!("arg_repo", locale = locale).to_string())
                        .value_name("REPO")
                        .required(true)
                        .action(ArgAction::Set),
                ),
        )
}

pub async fn run() -> Result<ExitCode> {
    // Pre-parse language and initialize i18n first.
    let language = pre_parse_language();
    rust_i18n::set_locale(&language);

    let matches = build_cli(&language).get_matches();
    let config_path = matches
        .get_one::<PathBuf>("config")
        .unwrap() // Has default
        .clone();

    match matches.subcommand() {
        Some(("init", init_matches)) => {
            let non_interactive = init_matches.get_flag("non-interactive");
            commands::init::run_init_wizard(&language, non_interactive)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("build", build_matches)) => {
            commands::build::execute(
                config_path,
                build_matches.get_one::<usize>("workers").copied(),
                build_matches.get_one::<String>("split").unwrap().clone(),
                build_matches.get_flag("rebuild"),
                build_matches.get_flag("verbose"),
            )
            .await
        }
        Some(("test", test_matches)) => {
            commands::test::execute(
                config_path,
                test_matches.get_one::<String>("repo").unwrap().clone(),
                test_matches
                    .get_many::<String>("test-ids")
                    .map(|ids| ids.cloned().collect())
                    .unwrap_or_default(),
                test_matches.get_one::<String>("branch").cloned(),
                test_matches.get_flag("reference"),
                test_matches.get_one::<String>("backend").cloned(),
                *test_matches.get_one::<u64>("timeout").unwrap(),
                *test_matches.get_one::<usize>("cpus").unwrap(),
                test_matches.get_flag("coverage"),
                test_matches.get_flag("rebuild"),
            )
            .await
        }
        Some(("evaluate", eval_matches)) => {
            commands::evaluate::execute(
                config_path,
                eval_matches.get_one::<String>("split").unwrap().clone(),
                eval_matches.get_one::<String>("branch").cloned(),
                eval_matches.get_flag("reference"),
                eval_matches.get_one::<String>("backend").cloned(),
                *eval_matches.get_one::<u64>("timeout").unwrap(),
                *eval_matches.get_one::<usize>("cpus").unwrap(),
                eval_matches.get_one::<usize>("workers").copied(),
                eval_matches.get_flag("coverage"),
                eval_matches.get_flag("rebuild"),
                eval_matches.get_one::<PathBuf>("json").cloned(),
                eval_matches.get_one::<PathBuf>("html").cloned(),
                eval_matches.get_flag("strict"),
            )
            .await
        }
        Some(("get-tests", get_matches)) => {
            commands::get_tests::execute(
                config_path,
                get_matches.get_one::<String>("repo").unwrap().clone(),
            )
            .await
        }
        _ => {
            // This case handles when no subcommand is given.
            // Clap will have already printed help info.
            Ok(ExitCode::SUCCESS)
        }
    }
}
