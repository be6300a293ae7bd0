use std::env;
use std::path::PathBuf;

pub struct CliOptions {
    pub job: Option<PathBuf>,
    pub preset: Option<String>,
    pub files: Vec<PathBuf>,
    pub columns: Option<Vec<String>>,
    pub rulesets: Option<Vec<String>>,
    pub peak: Option<String>,
    pub delay: Option<u32>,
    pub list_columns: bool,
    pub rules_out: Option<PathBuf>,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    if args.len() == 1 && (args[0] == "--help" || args[0] == "-h") {
        print_usage();
        std::process::exit(0);
    }
    parse_options(&args)
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut job = None;
    let mut preset = None;
    let mut files = Vec::new();
    let mut columns = None;
    let mut rulesets = None;
    let mut peak = None;
    let mut delay = None;
    let mut list_columns = false;
    let mut rules_out = None;

    while i < args.len() {
        match args[i].as_str() {
            "--job" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --job (expected a TOML file path)")?;
                if job.replace(PathBuf::from(path)).is_some() {
                    return Err("--job provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--file" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --file (expected a CSV file path)")?;
                files.push(PathBuf::from(path));
            }
            "--columns" => {
                i += 1;
                let list = args.next_or_err(
                    i,
                    "missing value for --columns (expected a comma-separated list)",
                )?;
                if columns.replace(split_list(list)).is_some() {
                    return Err("--columns provided more than once".to_string());
                }
            }
            "--rulesets" => {
                i += 1;
                let list = args.next_or_err(
                    i,
                    "missing value for --rulesets (expected a comma-separated list)",
                )?;
                if rulesets.replace(split_list(list)).is_some() {
                    return Err("--rulesets provided more than once".to_string());
                }
            }
            "--peak" => {
                i += 1;
                let period = args.next_or_err(i, "missing value for --peak (expected \"HH - HH\")")?;
                if peak.replace(period.to_string()).is_some() {
                    return Err("--peak provided more than once".to_string());
                }
            }
            "--delay" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --delay (expected hours)")?;
                let hours = raw
                    .parse::<u32>()
                    .map_err(|_| format!("--delay value \"{raw}\" is not a whole number of hours"))?;
                if delay.replace(hours).is_some() {
                    return Err("--delay provided more than once".to_string());
                }
            }
            "--rules-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --rules-out (expected a file path)")?;
                if rules_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--rules-out provided more than once".to_string());
                }
            }
            "--list-columns" => list_columns = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if job.is_some() && preset.is_some() {
        return Err(
            "arguments `--job` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    if job.is_none() && preset.is_none() {
        preset = Some("baseline".to_string());
    }

    Ok(CliOptions {
        job,
        preset,
        files,
        columns,
        rulesets,
        peak,
        delay,
        list_columns,
        rules_out,
    })
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  loadflex [--job <path> | --preset <name>] [--file <csv>]... [--columns a,b]"
    );
    eprintln!("           [--rulesets \"Name A,Name B\"]");
    eprintln!(
        "           [--peak \"HH - HH\"] [--delay <hours>] [--list-columns] [--rules-out <path>]"
    );
    eprintln!();
    eprintln!("Presets: baseline, appliances, evening_delay, ice_storage");
    eprintln!("Set RUST_LOG (e.g. RUST_LOG=loadflex=debug) to change log verbosity.");
}

#[cfg(test)]
mod tests {
    use super::parse_args_from;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn supports_job_cli() {
        let opts = parse_args_from(args(&["--job", "job.toml"])).expect("parse should succeed");
        assert_eq!(
            opts.job.as_deref().and_then(|p| p.to_str()),
            Some("job.toml")
        );
        assert!(opts.preset.is_none());
    }

    #[test]
    fn defaults_to_baseline_preset() {
        let opts = parse_args_from(Vec::new()).expect("parse should succeed");
        assert_eq!(opts.preset.as_deref(), Some("baseline"));
        assert!(opts.files.is_empty());
        assert!(!opts.list_columns);
    }

    #[test]
    fn collects_overrides_and_repeated_files() {
        let opts = parse_args_from(args(&[
            "--preset",
            "appliances",
            "--file",
            "a.csv",
            "--file",
            "b.csv",
            "--columns",
            "dishwasher, clothes_dryer",
            "--peak",
            "16 - 19",
            "--delay",
            "2",
            "--list-columns",
        ]))
        .expect("parse should succeed");
        assert_eq!(opts.files.len(), 2);
        assert_eq!(
            opts.columns,
            Some(vec!["dishwasher".to_string(), "clothes_dryer".to_string()])
        );
        assert_eq!(opts.peak.as_deref(), Some("16 - 19"));
        assert_eq!(opts.delay, Some(2));
        assert!(opts.list_columns);
    }

    #[test]
    fn rejects_job_with_preset() {
        let err = parse_args_from(args(&["--job", "j.toml", "--preset", "baseline"]));
        assert!(err.is_err_and(|e| e.contains("mutually exclusive")));
    }

    #[test]
    fn rejects_bad_delay_and_missing_values() {
        assert!(parse_args_from(args(&["--delay", "two"])).is_err());
        assert!(parse_args_from(args(&["--file"])).is_err());
        assert!(parse_args_from(args(&["--bogus"])).is_err());
    }

    #[test]
    fn collects_ruleset_names() {
        let opts = parse_args_from(args(&["--rulesets", "Fridge Schedule, Freezer,"]))
            .expect("should parse");
        assert_eq!(
            opts.rulesets,
            Some(vec!["Fridge Schedule".to_string(), "Freezer".to_string()])
        );
        assert!(parse_args_from(args(&["--rulesets"])).is_err());
        assert!(parse_args_from(args(&["--rulesets", "a", "--rulesets", "b"])).is_err());
    }
}
