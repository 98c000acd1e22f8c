use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use rating_core::*;
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rate")]
#[command(about = "Rate hydrologic values through time-versioned rating tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the directory of lazily loaded rating points
    #[arg(long, global = true)]
    points_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe the rating set in a ratings XML file
    Info {
        /// Ratings XML file
        file: PathBuf,
    },

    /// Rate value-sets (comma-separated, one value per independent parameter)
    #[command(allow_negative_numbers = true)]
    Rate {
        /// Ratings XML file
        file: PathBuf,

        /// Value-sets to rate, e.g. `715.2` or `2,1.5,1005`
        #[arg(required = true, value_parser = parse_value_set)]
        values: Vec<ValueSet>,

        #[command(flatten)]
        options: RateArgs,
    },

    /// Reverse rate dependent values of a single-axis rating
    #[command(allow_negative_numbers = true)]
    Reverse {
        /// Ratings XML file
        file: PathBuf,

        /// Dependent values to reverse rate
        #[arg(required = true)]
        values: Vec<f64>,

        #[command(flatten)]
        options: RateArgs,
    },

    /// Round values with a 10-digit USGS rounding specification
    #[command(allow_negative_numbers = true)]
    Round {
        /// Rounding specification, e.g. 2223456782
        spec: String,

        #[arg(required = true)]
        values: Vec<f64>,

        /// Resolve ties to the even neighbor
        #[arg(long)]
        half_even: bool,
    },
}

#[derive(Args)]
struct RateArgs {
    /// Units of the values, e.g. `ft;ac-ft` (defaults to the config)
    #[arg(long)]
    units: Option<String>,

    /// Vertical datum of elevation values (NGVD-29, NAVD-88, OTHER)
    #[arg(long)]
    datum: Option<String>,

    /// Time the values were observed (defaults to now)
    #[arg(long)]
    time: Option<String>,

    /// Ignore ratings effective or created after this time
    #[arg(long)]
    rating_time: Option<String>,

    /// Round results with the specification's rounding
    #[arg(long)]
    round: bool,
}

impl RateArgs {
    fn to_options(&self, config: &Config) -> Result<RateOptions> {
        Ok(RateOptions {
            units: self.units.clone(),
            vertical_datum: self.datum.clone(),
            time: self.time.as_deref().map(parse_time).transpose()?,
            rating_time: self.rating_time.as_deref().map(parse_time).transpose()?,
            round: self.round || config.rating.round,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    rating_core::logging::init(&config.logging.level)?;
    if let Some(points_dir) = cli.points_dir {
        config.data.points_dir = points_dir;
    }

    match cli.command {
        Commands::Info { file } => cmd_info(&file, &config, cli.json),
        Commands::Rate {
            file,
            values,
            options,
        } => cmd_rate(&file, values, &options, &config, cli.json),
        Commands::Reverse {
            file,
            values,
            options,
        } => cmd_reverse(&file, values, &options, &config, cli.json),
        Commands::Round {
            spec,
            values,
            half_even,
        } => cmd_round(&spec, &values, half_even, cli.json),
    }
}

/// One value per independent parameter
#[derive(Clone, Debug)]
struct ValueSet(Vec<f64>);

/// Parse `a,b,c` into one value-set
fn parse_value_set(text: &str) -> std::result::Result<ValueSet, String> {
    text.split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", part.trim()))
        })
        .collect::<std::result::Result<Vec<f64>, String>>()
        .map(ValueSet)
}

fn load_set(file: &Path, config: &Config) -> Result<RatingSet> {
    let xml = std::fs::read_to_string(file)?;
    let mut set = RatingSet::from_xml(&xml, &ParserRegistry::default())?;
    config.configure(&mut set)?;
    Ok(set)
}

fn cmd_info(file: &Path, config: &Config, as_json: bool) -> Result<()> {
    let set = load_set(file, config)?;
    let spec = set.specification();

    if as_json {
        let ratings: Vec<_> = set
            .ratings()
            .map(|r| {
                json!({
                    "effective_time": r.effective_time(),
                    "create_time": r.create_time,
                    "active": r.active,
                    "units": r.units().join(";"),
                    "loaded": r.has_rating_points(),
                })
            })
            .collect();
        let info = json!({
            "specification": spec.id(),
            "template": spec.template().id(),
            "office": spec.office(),
            "axes": set.axis_count(),
            "lookup": spec.lookup().iter().map(|p| p.names()).collect::<Vec<_>>(),
            "vertical_datum_info": set.vertical_datum_info(),
            "ratings": ratings,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Specification: {}", spec.id());
    println!("Template:      {}", spec.template().id());
    if let Some(office) = spec.office() {
        println!("Office:        {}", office);
    }
    if let Some(description) = &spec.description {
        println!("Description:   {}", description);
    }
    let params = spec.template().ind_params();
    for (param, policy) in params.iter().zip(spec.lookup()) {
        println!("  {:<20} {}", param, policy.names().join(", "));
    }
    println!("  -> {}", spec.template().dep_param());

    if let Some(info) = set.vertical_datum_info() {
        println!("Native datum:  {} ({})", info.native_datum, info.unit);
        for offset in &info.offsets {
            println!(
                "  to {:<10} {:+}{}",
                offset.to_datum,
                offset.value,
                if offset.estimate { " (estimate)" } else { "" }
            );
        }
    }

    println!(
        "Ratings:       {} ({} active)",
        set.len(),
        set.active_ratings().count()
    );
    for rating in set.ratings() {
        let points = if rating.has_rating_points() {
            format!("{} points", rating.table()?.len())
        } else {
            "points not loaded".to_string()
        };
        println!(
            "  {}  {:<8}  {:<12}  {}",
            rating.effective_time().format("%Y-%m-%dT%H:%M:%SZ"),
            if rating.active { "active" } else { "inactive" },
            rating.units().join(";"),
            points
        );
    }
    Ok(())
}

fn cmd_rate(
    file: &Path,
    values: Vec<ValueSet>,
    args: &RateArgs,
    config: &Config,
    as_json: bool,
) -> Result<()> {
    let set = load_set(file, config)?;
    let options = args.to_options(config)?;
    let values: Vec<Vec<f64>> = values.into_iter().map(|set| set.0).collect();
    let rated = set.rate_values(&values, None, &options)?;
    print_results(&set, &values, &rated, options.time, as_json)
}

fn cmd_reverse(
    file: &Path,
    values: Vec<f64>,
    args: &RateArgs,
    config: &Config,
    as_json: bool,
) -> Result<()> {
    let set = load_set(file, config)?;
    let options = args.to_options(config)?;
    let rated = set.reverse_rate_values(&values, None, &options)?;
    let inputs: Vec<Vec<f64>> = values.into_iter().map(|v| vec![v]).collect();
    print_results(&set, &inputs, &rated, options.time, as_json)
}

fn print_results(
    set: &RatingSet,
    inputs: &[Vec<f64>],
    rated: &[f64],
    time: Option<DateTime<Utc>>,
    as_json: bool,
) -> Result<()> {
    if as_json {
        let output = json!({
            "specification": set.specification().id(),
            "time": time,
            "inputs": inputs,
            "values": RateOutput::Values(rated.to_vec()),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for (input, value) in inputs.iter().zip(rated) {
        let input: Vec<String> = input.iter().map(f64::to_string).collect();
        println!("{} -> {}", input.join(","), value);
    }
    Ok(())
}

fn cmd_round(spec: &str, values: &[f64], half_even: bool, as_json: bool) -> Result<()> {
    let rounder: UsgsRounder = spec.parse()?;
    let rounded = rounder.round_s(values, half_even);

    if as_json {
        let output = json!({
            "spec": rounder.spec(),
            "values": rounded,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for text in rounded {
        println!("{}", text);
    }
    Ok(())
}
