use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use raplcap_msr::{Constraint, Limit, RaplCap, RaplCapConfig, Zone};

#[derive(Parser, Debug)]
#[command(name = "rapl-configure")]
#[command(about = "Get or set Intel RAPL power limits through MSRs")]
struct Args {
    #[arg(short = 'p', long, default_value_t = 0, help = "Package to inspect or configure")]
    package: u32,

    #[arg(short = 'd', long, default_value_t = 0, help = "Die within the package")]
    die: u32,

    #[arg(
        short = 'z',
        long,
        default_value = "PACKAGE",
        value_parser = parse_zone,
        help = "Zone: PACKAGE, CORE, UNCORE, DRAM or PSYS"
    )]
    zone: Zone,

    #[arg(short = 'n', long, help = "Print the number of packages and exit")]
    npackages: bool,

    #[arg(short = 's', long, help = "Long term time window in seconds (0 = unchanged)")]
    seconds0: Option<f64>,

    #[arg(short = 'w', long, help = "Long term power limit in watts (0 = unchanged)")]
    watts0: Option<f64>,

    #[arg(short = 'S', long, help = "Short term time window in seconds (0 = unchanged)")]
    seconds1: Option<f64>,

    #[arg(short = 'W', long, help = "Short term power limit in watts (0 = unchanged)")]
    watts1: Option<f64>,

    #[arg(short = 'P', long, help = "Peak power limit in watts (0 = unchanged)")]
    watts2: Option<f64>,

    #[arg(short = 'e', long, help = "Enable (1) or disable (0) the zone")]
    enabled: Option<u8>,

    #[arg(short = 'c', long, help = "Enable (1) or disable (0) clamping")]
    clamped: Option<u8>,

    #[arg(
        short = 'l',
        long,
        help = "Lock the zone's power limits until the next reset (irreversible)"
    )]
    lock: bool,

    #[arg(
        short,
        long,
        help = "Enable verbose logging (shows all MSR read/write operations)"
    )]
    verbose: bool,
}

impl Args {
    fn long_term(&self) -> Option<Limit> {
        limit(self.seconds0, self.watts0)
    }

    fn short_term(&self) -> Option<Limit> {
        limit(self.seconds1, self.watts1)
    }

    fn is_set(&self) -> bool {
        self.long_term().is_some()
            || self.short_term().is_some()
            || self.watts2.is_some()
            || self.enabled.is_some()
            || self.clamped.is_some()
            || self.lock
    }
}

fn limit(seconds: Option<f64>, watts: Option<f64>) -> Option<Limit> {
    if seconds.is_none() && watts.is_none() {
        return None;
    }
    Some(Limit::new(seconds.unwrap_or(0.0), watts.unwrap_or(0.0)))
}

fn parse_zone(s: &str) -> Result<Zone, String> {
    Zone::from_name(s).ok_or_else(|| {
        let names: Vec<&str> = Zone::all().iter().map(|z| z.name()).collect();
        format!("unknown zone '{s}', expected one of {}", names.join(", "))
    })
}

fn parse_flag(name: &str, value: u8) -> anyhow::Result<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => bail!("--{name} must be 0 or 1, got {value}"),
    }
}

fn check_permissions(config: &RaplCapConfig) -> anyhow::Result<()> {
    let msr_safe = config.msr_safe_path(0);
    let msr = config.msr_path(0);
    if !msr_safe.exists() && !msr.exists() {
        bail!(
            "Cannot access {} or {}\n\nThe msr kernel module may not be loaded.\nRun: sudo modprobe msr",
            msr_safe.display(),
            msr.display()
        );
    }
    Ok(())
}

fn print_zone(cap: &RaplCap, pkg: u32, die: u32, zone: Zone) -> anyhow::Result<()> {
    let enabled = cap.is_zone_enabled(pkg, die, zone)?;
    let clamped = cap.is_zone_clamped(pkg, die, zone)?;
    let locked = cap.is_zone_locked(pkg, die, zone)?;
    let limits = cap.get_limits(pkg, die, zone)?;

    println!("{:>22}: {}", "enabled", enabled);
    println!("{:>22}: {}", "clamped", clamped);
    println!("{:>22}: {}", "locked", locked);
    println!("{:>22}: {:.6}", "watts_long", limits.long_term.watts);
    println!("{:>22}: {:.6}", "seconds_long", limits.long_term.seconds);
    if let Some(short) = limits.short_term {
        println!("{:>22}: {:.6}", "watts_short", short.watts);
        println!("{:>22}: {:.6}", "seconds_short", short.seconds);
    }
    if cap.is_constraint_supported(pkg, die, zone, Constraint::PeakPower)? {
        let peak = cap.get_limit(pkg, die, zone, Constraint::PeakPower)?;
        println!("{:>22}: {:.6}", "watts_peak", peak.watts);
    }

    match cap.get_energy_counter(pkg, die, zone) {
        Ok(joules) => println!("{:>22}: {:.6}", "joules", joules),
        Err(e) if e.is_unavailable() => {}
        Err(e) => return Err(e.into()),
    }
    println!(
        "{:>22}: {:.6}",
        "joules_max",
        cap.get_energy_counter_max(pkg, die, zone)?
    );
    Ok(())
}

fn configure(cap: &RaplCap, args: &Args) -> anyhow::Result<()> {
    let (pkg, die, zone) = (args.package, args.die, args.zone);

    let long_term = args.long_term();
    let short_term = args.short_term();
    if long_term.is_some() || short_term.is_some() {
        cap.set_limits(pkg, die, zone, long_term.as_ref(), short_term.as_ref())
            .with_context(|| format!("Failed to set {zone} limits"))?;
    }

    if let Some(watts) = args.watts2 {
        cap.set_limit(
            pkg,
            die,
            zone,
            Constraint::PeakPower,
            &Limit::new(0.0, watts),
        )
        .with_context(|| format!("Failed to set {zone} peak power"))?;
    }

    if let Some(enabled) = args.enabled {
        let enabled = parse_flag("enabled", enabled)?;
        cap.set_zone_enabled(pkg, die, zone, enabled)
            .with_context(|| format!("Failed to set {zone} enabled={enabled}"))?;
    }

    if let Some(clamped) = args.clamped {
        let clamped = parse_flag("clamped", clamped)?;
        cap.set_zone_clamped(pkg, die, zone, clamped)
            .with_context(|| format!("Failed to set {zone} clamped={clamped}"))?;
    }

    if args.lock {
        tracing::warn!("Locking {} on package {} die {} until reset", zone, pkg, die);
        cap.set_zone_locked(pkg, die, zone)
            .with_context(|| format!("Failed to lock {zone}"))?;
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup logging based on verbose flag; RUST_LOG takes precedence
    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.npackages {
        println!("{}", raplcap_msr::global::num_packages()?);
        return Ok(());
    }

    let config = RaplCapConfig::from_env();
    check_permissions(&config)?;

    let cap = RaplCap::with_config(&config).context("Failed to initialize RAPL")?;
    tracing::info!(
        "Detected {} with {} package(s)",
        cap.model().name,
        cap.num_packages()
    );

    if !cap
        .is_zone_supported(args.package, args.die, args.zone)
        .with_context(|| format!("Failed to probe {}", args.zone))?
    {
        bail!(
            "Zone {} is not supported on package {} die {}",
            args.zone,
            args.package,
            args.die
        );
    }

    let result = if args.is_set() {
        configure(&cap, &args)
    } else {
        print_zone(&cap, args.package, args.die, args.zone)
    };

    cap.destroy().context("Failed to close MSR devices")?;
    result
}
