//! loadflex entry point: CLI wiring, tracing setup and measure dispatch.

use std::process;

use tracing_subscriber::EnvFilter;

use loadflex::cli::{CliOptions, parse_args, print_usage};
use loadflex::config::JobConfig;
use loadflex::host::FileHost;
use loadflex::runner::{
    MeasureOutcome, MeasureStatus, run_calendar_rulesets, run_peak_shift, run_storage_schedules,
    schedule_column_names,
};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("loadflex=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_job(cli: &CliOptions) -> JobConfig {
    // --job takes priority; the parser already defaults to the baseline preset
    let loaded = match (&cli.job, &cli.preset) {
        (Some(path), _) => JobConfig::from_toml_file(path),
        (None, Some(name)) => JobConfig::from_preset(name),
        (None, None) => Ok(JobConfig::baseline()),
    };
    let mut job = loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    if let Some(columns) = &cli.columns {
        job.shift.columns = columns.clone();
    }
    if let Some(rulesets) = &cli.rulesets {
        job.shift.rulesets = rulesets.clone();
    }
    if let Some(peak) = &cli.peak {
        job.shift.peak_period = peak.clone();
    }
    if let Some(delay) = cli.delay {
        job.shift.delay_hours = delay;
    }

    let errors = job.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    job
}

fn report(outcome: &MeasureOutcome) {
    if outcome.status == MeasureStatus::NotApplicable {
        eprintln!("[not applicable]");
    }
    for d in &outcome.diagnostics {
        eprintln!("{d}");
    }
}

fn run(cli: &CliOptions, job: &JobConfig) -> loadflex::Result<()> {
    let mut host = FileHost::from_paths(&cli.files)?;

    if cli.list_columns {
        for name in schedule_column_names(&host) {
            println!("{name}");
        }
        return Ok(());
    }

    // rulesets go in first so [shift] rulesets can name them
    if !job.rulesets.is_empty() {
        let rulesets = job
            .rulesets
            .iter()
            .map(|rs| rs.build())
            .collect::<loadflex::Result<Vec<_>>>()?;
        report(&run_calendar_rulesets(&mut host, rulesets)?);
    }

    if let Some(storage) = &job.storage {
        let plan = storage.to_plan()?;
        report(&run_storage_schedules(&mut host, &plan)?);
    }

    let shift_job = job.shift_job()?;
    report(&run_peak_shift(&mut host, &shift_job)?);

    if let Some(path) = &cli.rules_out {
        host.write_rulesets(path)?;
        eprintln!("Rulesets written to {}", path.display());
    }
    Ok(())
}

fn main() {
    init_tracing();

    let cli = parse_args().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        print_usage();
        process::exit(1);
    });
    let job = load_job(&cli);

    if let Err(e) = run(&cli, &job) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
