use anyhow::{bail, Context};
use clap::Parser;
use csv_core::{ReadFieldResult, ReaderBuilder};
use std::fs::File;
use std::io;
use std::mem::take;
use std::path::PathBuf;
use std::str;
use std::time::Instant;
use subgroup_discovery::*;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

/// Finds subgroups of a delimited data file whose target columns behave unusually.
///
/// The first line of the input names the columns. Columns holding only 0/1 or true/false are
/// binary, columns holding only numbers are numeric, and all others are nominal.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Input file; standard input if omitted
    input: Option<PathBuf>,
    /// Field delimiter
    #[arg(long, default_value_t = '\t')]
    delimiter: char,
    /// Kind of target: single nominal, single numeric, double regression, double correlation or
    /// multi label
    #[arg(long, default_value = "single nominal")]
    target_type: TargetKind,
    /// Target column; repeat for double and multi-label targets
    #[arg(long = "target", required = true)]
    targets: Vec<String>,
    /// Value of a single nominal target that counts as positive
    #[arg(long, default_value = "1")]
    target_value: String,
    /// Quality measure
    #[arg(long)]
    measure: Option<Measure>,
    /// Minimum quality of a reported subgroup
    #[arg(long)]
    quality_minimum: Option<f64>,
    /// Maximum number of conditions per subgroup
    #[arg(long)]
    depth: Option<usize>,
    /// Minimum number of rows per subgroup
    #[arg(long)]
    minimum_coverage: Option<usize>,
    /// Maximum size of a reported subgroup, as a fraction of all rows
    #[arg(long)]
    maximum_coverage: Option<f64>,
    /// Number of subgroups to report
    #[arg(long)]
    maximum_subgroups: Option<usize>,
    /// Time limit in minutes
    #[arg(long)]
    maximum_time: Option<f64>,
    /// Search strategy: breadth first, depth first, best first or beam
    #[arg(long)]
    strategy: Option<SearchStrategy>,
    /// Beam width
    #[arg(long)]
    width: Option<usize>,
    /// Nominal operators: equals, equals and does not equal, or element of
    #[arg(long)]
    nominal_operators: Option<NominalOperators>,
    /// Numeric operators: normal, less than or equal, greater than or equal, equals or all
    #[arg(long)]
    numeric_operators: Option<NumericOperators>,
    /// Numeric strategy: all, bins, best or intervals
    #[arg(long)]
    numeric_strategy: Option<NumericStrategy>,
    /// Number of bins for the bins strategy
    #[arg(long)]
    bins: Option<usize>,
    /// Entropy exponent of the weighted edit distance measure
    #[arg(long)]
    alpha: Option<f64>,
    /// Edit distance exponent of the weighted edit distance measure
    #[arg(long)]
    beta: Option<f64>,
    /// Re-score a multi-label result over N resampled graphs per side
    #[arg(long, value_name = "N")]
    post_processing: Option<usize>,
    /// Subgroups kept by post-processing
    #[arg(long, default_value_t = 100)]
    post_processing_subgroups: usize,
    /// Worker threads; 0 uses every core
    #[arg(long, default_value_t = 1)]
    threads: usize,
    /// Seed for the validation procedures and post-processing
    #[arg(long)]
    seed: Option<u64>,
    /// Instead of mining, score N random row sets
    #[arg(long, value_name = "N", group = "validation")]
    random_subgroups: Option<usize>,
    /// Instead of mining, score N random descriptions
    #[arg(long, value_name = "N", group = "validation")]
    random_conditions: Option<usize>,
    /// Instead of mining, run N searches with shuffled targets
    #[arg(long, value_name = "N", group = "validation")]
    swap_randomization: Option<usize>,
    /// More logging; repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn params(&self) -> SearchParameters {
        let mut params = SearchParameters::default();
        if let Some(measure) = self.measure {
            params = params.with_quality_measure(measure);
        }
        if let Some(minimum) = self.quality_minimum {
            params = params.with_quality_minimum(minimum);
        }
        if let Some(depth) = self.depth {
            params = params.with_search_depth(depth);
        }
        if let Some(coverage) = self.minimum_coverage {
            params = params.with_minimum_coverage(coverage);
        }
        if let Some(fraction) = self.maximum_coverage {
            params = params.with_maximum_coverage_fraction(fraction);
        }
        if let Some(n) = self.maximum_subgroups {
            params = params.with_maximum_subgroups(n);
        }
        if let Some(minutes) = self.maximum_time {
            params = params.with_maximum_time(minutes);
        }
        if self.strategy.is_some() || self.width.is_some() {
            let strategy = self.strategy.unwrap_or(params.search_strategy);
            let width = self.width.unwrap_or(params.search_strategy_width);
            params = params.with_search_strategy(strategy, width);
        }
        if let Some(operators) = self.nominal_operators {
            params = params.with_nominal_operators(operators);
        }
        if let Some(strategy) = self.numeric_strategy {
            params = params.with_numeric_strategy(strategy);
        }
        if let Some(operators) = self.numeric_operators {
            params = params.with_numeric_operators(operators);
        }
        if let Some(bins) = self.bins {
            params = params.with_nr_bins(bins);
        }
        if self.alpha.is_some() || self.beta.is_some() {
            let alpha = self.alpha.unwrap_or(params.alpha);
            let beta = self.beta.unwrap_or(params.beta);
            params = params.with_alpha_beta(alpha, beta);
        }
        if let Some(count) = self.post_processing {
            params = params.with_post_processing(count, self.post_processing_subgroups);
        }
        params
    }

    fn concept(&self) -> anyhow::Result<TargetConcept> {
        let targets = &self.targets;
        let pair = || match targets.as_slice() {
            [primary, secondary] => Ok((primary.clone(), secondary.clone())),
            _ => Err(anyhow::anyhow!("a {} target needs exactly two columns", self.target_type)),
        };
        Ok(match self.target_type {
            TargetKind::SingleNominal | TargetKind::SingleNumeric if targets.len() != 1 => {
                bail!("a {} target needs exactly one column", self.target_type)
            }
            TargetKind::SingleNominal => TargetConcept::SingleNominal {
                column: targets[0].clone(),
                value: self.target_value.clone(),
            },
            TargetKind::SingleNumeric => TargetConcept::SingleNumeric {
                column: targets[0].clone(),
            },
            TargetKind::DoubleRegression => {
                let (primary, secondary) = pair()?;
                TargetConcept::DoubleRegression { primary, secondary }
            }
            TargetKind::DoubleCorrelation => {
                let (primary, secondary) = pair()?;
                TargetConcept::DoubleCorrelation { primary, secondary }
            }
            TargetKind::MultiLabel => TargetConcept::MultiLabel {
                columns: targets.clone(),
            },
        })
    }
}

fn parse_error(line: u64, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

fn load_data<I: io::Read>(mut input: I, name: &str, delimiter: u8) -> Result<Table> {
    let mut inputbuf = [0; 16384];
    let mut fieldbuf = [0; 1024];
    let mut fieldlen = 0;
    let mut header: Option<Vec<String>> = None;
    let mut record = Vec::new();
    let mut columns: Vec<Vec<String>> = Vec::new();
    let mut reader = ReaderBuilder::new().delimiter(delimiter).build();

    loop {
        let read = input.read(&mut inputbuf)?;
        let mut bytes = &inputbuf[..read];
        loop {
            let (result, nin, nout) = reader.read_field(bytes, &mut fieldbuf[fieldlen..]);
            bytes = &bytes[nin..];
            fieldlen += nout;
            match result {
                ReadFieldResult::InputEmpty => break,
                ReadFieldResult::OutputFull => {
                    return Err(parse_error(reader.line(), "field too long"));
                }
                ReadFieldResult::Field { record_end } => {
                    let field = str::from_utf8(&fieldbuf[..fieldlen])
                        .map_err(|e| parse_error(reader.line(), e.to_string()))?;
                    fieldlen = 0;
                    record.push(field.trim().to_owned());

                    if record_end {
                        match &header {
                            None => {
                                columns = vec![Vec::new(); record.len()];
                                header = Some(take(&mut record));
                            }
                            Some(names) if names.len() != record.len() => {
                                return Err(parse_error(
                                    reader.line(),
                                    format!("expected {} fields, found {}", names.len(), record.len()),
                                ));
                            }
                            Some(_) => {
                                for (column, value) in columns.iter_mut().zip(record.drain(..)) {
                                    column.push(value);
                                }
                            }
                        }
                    }
                }
                ReadFieldResult::End => {
                    let names = header.ok_or_else(|| parse_error(0, "no header line"))?;
                    let mut builder = TableBuilder::new(name);
                    for (name, values) in names.into_iter().zip(columns) {
                        builder = builder.inferred(name, &values)?;
                    }
                    return Ok(builder.build());
                }
            }
        }
    }
}

fn print_fit(procedure: &str, qualities: &[f64]) -> anyhow::Result<()> {
    let fit = NormalDistribution::from_qualities(qualities)?;
    println!("{}: {} samples", procedure, qualities.len());
    println!("  mean: {:.6}", fit.mean());
    println!("  standard deviation: {:.6}", fit.std_dev());
    println!("  1% threshold: {:.6}", fit.one_percent());
    println!("  5% threshold: {:.6}", fit.five_percent());
    println!("  10% threshold: {:.6}", fit.ten_percent());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    if !args.delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character");
    }
    let delimiter = args.delimiter as u8;
    let table = match &args.input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            let name = path.file_stem().map_or_else(String::new, |s| s.to_string_lossy().into_owned());
            load_data(io::BufReader::new(file), &name, delimiter)?
        }
        None => load_data(io::stdin().lock(), "stdin", delimiter)?,
    };
    info!(rows = table.nr_rows(), columns = table.nr_columns(), "loaded {}", table.name());

    let params = args.params();
    let concept = args.concept()?;

    if args.random_subgroups.is_some() || args.random_conditions.is_some() || args.swap_randomization.is_some() {
        let mut validation = Validation::new(params, &table, concept)?;
        if let Some(seed) = args.seed {
            validation = validation.with_seed(seed);
        }
        if let Some(n) = args.random_subgroups {
            print_fit("random subgroups", &validation.random_subgroups(n)?)?;
        }
        if let Some(n) = args.random_conditions {
            print_fit("random conditions", &validation.random_conditions(n)?)?;
        }
        if let Some(n) = args.swap_randomization {
            print_fit("swap randomization", &validation.swap_randomization(n)?)?;
        }
        return Ok(());
    }

    let target = TargetContext::from_concept(&table, &concept)?;
    let mut search = SubgroupDiscovery::new(params, &table, target)?;
    if let Some(seed) = args.seed {
        search = search.with_seed(seed);
    }
    let begin = Instant::now();
    let summary = if args.threads == 1 {
        search.mine(begin)
    } else {
        search.mine_threaded(begin, args.threads)
    };
    if summary.timed_out {
        eprintln!("time limit reached; results are incomplete");
    }

    println!("id\tcoverage\tquality\tsecondary\ttertiary\tconditions");
    for subgroup in search.result().iter() {
        println!("{}", subgroup);
    }
    Ok(())
}
