use complemake_core::{run_build, run_clean, run_query_exec_env, Config};

fn print_usage() {
    let called_as = std::env::args().next();
    eprintln!(
        r#"usage: {} [global options] <build|clean|query> [command options] [targets...]

global options:
  --version          print complemake version ("{}")
  -n, --dry-run      print commands without running them
  -o, --output-dir D build output directory [default=out]
  -p, --project F    project file [default=complemake.yml]
      --shared-dir D shared cache directory (in addition to --output-dir)
  -s, --system-type T cross-compilation target triplet
      --tool-c++ P   path to the C++ compiler driver
      --tool-ld P    path to the linker driver
  -v, --verbose      increase verbosity (repeatable)

build options:
      --force        rebuild all targets, ignoring metadata
      --force-test   rebuild and rerun all test targets
  -j, --jobs N       run N jobs in parallel [default={}, derived from CPUs available]
  -k, --keep-going   keep building after a failed job
  -f, --target-file P  build the target producing P (repeatable)
  -t, --target-name N  build the target named N (repeatable)

query options:
      --exec-env     print the environment needed to run built binaries
"#,
        called_as.as_deref().unwrap_or("complemake"),
        env!("CARGO_PKG_VERSION"),
        num_cpus::get() + 1,
    );
}

fn parse_global(args: &mut pico_args::Arguments) -> anyhow::Result<Config> {
    Ok(Config {
        project_path: args
            .opt_value_from_str(["-p", "--project"])?
            .unwrap_or_else(|| std::path::PathBuf::from("complemake.yml")),
        output_dir: args
            .opt_value_from_str(["-o", "--output-dir"])?
            .unwrap_or_else(|| std::path::PathBuf::from("out")),
        shared_dir: args.opt_value_from_str("--shared-dir")?,
        system_type: args.opt_value_from_str(["-s", "--system-type"])?,
        tool_cxx: args.opt_value_from_str("--tool-c++")?,
        tool_ld: args.opt_value_from_str("--tool-ld")?,
        verbose: 0,
        dry_run: false,
        force: false,
        force_test: false,
        jobs: num_cpus::get() + 1,
        keep_going: false,
        target_files: Vec::new(),
        target_names: Vec::new(),
    })
}

/// Pulls the first non-flag token out of the raw argv as the subcommand,
/// leaving everything else for `pico_args` to parse normally.
fn take_subcommand(raw: Vec<std::ffi::OsString>) -> (String, Vec<std::ffi::OsString>) {
    let mut rest = Vec::with_capacity(raw.len());
    let mut subcommand = String::new();
    for arg in raw {
        if subcommand.is_empty() {
            if let Some(s) = arg.to_str() {
                if !s.starts_with('-') {
                    subcommand = s.to_owned();
                    continue;
                }
            }
        }
        rest.push(arg);
    }
    (subcommand, rest)
}

/// Counts and strips `-v`/`--verbose` occurrences from the raw argv;
/// `pico_args::Arguments::contains` only reports presence, not count, so
/// repeatable verbosity (spec §6) needs this pass before handing the rest
/// off, the same way `-f`/`-t` are accumulated in `main`.
fn take_verbosity(raw: Vec<std::ffi::OsString>) -> (u8, Vec<std::ffi::OsString>) {
    let mut rest = Vec::with_capacity(raw.len());
    let mut count: u8 = 0;
    for arg in raw {
        if arg == "-v" || arg == "--verbose" {
            count = count.saturating_add(1);
        } else {
            rest.push(arg);
        }
    }
    (count, rest)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let raw: Vec<std::ffi::OsString> = std::env::args_os().skip(1).collect();
    let (subcommand, rest) = take_subcommand(raw);
    let (verbose, rest) = take_verbosity(rest);
    let mut args = pico_args::Arguments::from_vec(rest);

    if args.contains(["-h", "--help"]) {
        print_usage();
        std::process::exit(1);
    }
    if args.contains("--version") {
        println!("{}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    let dry_run = args.contains(["-n", "--dry-run"]);
    let mut config = parse_global(&mut args)?;
    config.verbose = verbose;
    config.dry_run = dry_run;

    match subcommand.as_str() {
        "build" => {
            config.force = args.contains("--force");
            config.force_test = args.contains("--force-test");
            config.jobs = args
                .opt_value_from_str(["-j", "--jobs"])?
                .unwrap_or_else(|| num_cpus::get() + 1);
            config.keep_going = args.contains(["-k", "--keep-going"]);
            while let Some(path) = args.opt_value_from_str::<_, std::path::PathBuf>(["-f", "--target-file"])? {
                config.target_files.push(path);
            }
            while let Some(name) = args.opt_value_from_str::<_, String>(["-t", "--target-name"])? {
                config.target_names.push(name);
            }
            config.target_names.extend(args.free()?);

            let report = run_build(&config)?;
            eprintln!("{}", report.footer());
            if !report.succeeded {
                std::process::exit(1);
            }
            Ok(())
        }
        "clean" => run_clean(&config),
        "query" => {
            if args.contains("--exec-env") {
                println!("{}", run_query_exec_env(&config)?);
                Ok(())
            } else {
                print_usage();
                std::process::exit(1);
            }
        }
        other => {
            if other.is_empty() {
                eprintln!("error: no subcommand given");
            } else {
                eprintln!("error: unknown subcommand '{}'", other);
            }
            print_usage();
            std::process::exit(1);
        }
    }
}
