use std::f64::consts::PI;

use rand::Rng;
use rand::SeedableRng;
use rand::distributions::{Distribution, Standard};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use super::config::{Constraint, GeneratorConfig, PUF_SOURCE};
use super::error::{ColumnRole, ConfigError, PipelineError, Result};
use super::schema::SchemaRegistry;
use super::types::{Dataset, Mode, RandomizationContext, Values};

/// What each stage did to the dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReport {
    pub dropped: Vec<String>,
    pub randomized: Vec<String>,
    pub skipped: Vec<String>,
    pub rows_before_sampling: usize,
    pub rows_after_sampling: usize,
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub dataset: Dataset,
    pub report: StageReport,
}

/// Runs filter, randomize, repair, sample and re-key in that order.
///
/// One `ChaCha8Rng` seeded with `ctx.seed` is shared by the randomizer and
/// then the sampler. Draws are taken column by column in dataset column order
/// and row by row within a column, so the output for a given seed depends on
/// the source header order. In [`Mode::PassThrough`] neither stage runs and no
/// values are changed apart from the identifier column.
pub fn run_pipeline(
    mut dataset: Dataset,
    config: &GeneratorConfig,
    registry: &SchemaRegistry,
    ctx: &RandomizationContext,
) -> Result<PipelineOutcome> {
    config.validate(registry)?;
    let unknown = registry.unknown_columns(&dataset);
    if !unknown.is_empty() {
        warn!(columns = ?unknown, "dataset columns not recognized by schema registry");
    }
    let availability = registry.availability_mismatch(&dataset, PUF_SOURCE);
    if !availability.missing.is_empty() {
        warn!(
            source = PUF_SOURCE,
            columns = ?availability.missing,
            "registry variables available in source but absent from dataset"
        );
    }
    config.validate_against(&dataset)?;

    info!(
        rows = dataset.row_count(),
        columns = dataset.column_count(),
        "shape before dropping"
    );
    let mut report = StageReport {
        dropped: filter_columns(&mut dataset, config)?,
        ..StageReport::default()
    };
    info!(
        rows = dataset.row_count(),
        columns = dataset.column_count(),
        "shape after dropping"
    );

    report.rows_before_sampling = dataset.row_count();
    let mut dataset = match ctx.mode {
        Mode::Randomize => {
            let mut rng = ChaCha8Rng::seed_from_u64(ctx.seed);
            let (randomized, skipped) =
                randomize_columns(&mut dataset, config, ctx.tax_year, &mut rng)?;
            report.randomized = randomized;
            report.skipped = skipped;
            repair_constraints(&mut dataset, &config.constraints)?;
            sample_rows(&dataset, ctx.sample_size, &mut rng)?
        }
        Mode::PassThrough => dataset,
    };
    assign_identifiers(&mut dataset, &config.id_column)?;
    report.rows_after_sampling = dataset.row_count();
    info!(
        rows = dataset.row_count(),
        columns = dataset.column_count(),
        "shape after sampling"
    );

    Ok(PipelineOutcome { dataset, report })
}

/// Removes every configured drop column. Names are checked against the
/// registry once, by [`GeneratorConfig::validate`] in [`run_pipeline`].
pub fn filter_columns(
    dataset: &mut Dataset,
    config: &GeneratorConfig,
) -> std::result::Result<Vec<String>, ConfigError> {
    let mut dropped = Vec::with_capacity(config.drop_columns.len());
    for name in &config.drop_columns {
        if !dataset.drop_column(name) {
            return Err(ConfigError::MissingColumn {
                role: ColumnRole::Drop,
                name: name.clone(),
            });
        }
        dropped.push(name.clone());
    }
    Ok(dropped)
}

/// Applies multiplicative normal noise to every column not in the skip set
/// and stamps the year column with `tax_year`. Returns the randomized and
/// skipped column names, in visiting order.
pub fn randomize_columns<R: Rng + ?Sized>(
    dataset: &mut Dataset,
    config: &GeneratorConfig,
    tax_year: i32,
    rng: &mut R,
) -> Result<(Vec<String>, Vec<String>)> {
    let rows = dataset.row_count();
    dataset.set_column(
        &config.year_column,
        Values::Int(vec![i64::from(tax_year); rows]),
    )?;

    let mean = config.noise_mean(tax_year);
    let std_dev = config.noise_std_dev;
    let mut normal = NormalSampler::default();
    let mut randomized = Vec::new();
    let mut skipped = Vec::new();

    for column in dataset.columns_mut() {
        if config.skip_columns.contains(&column.name) || column.name == config.year_column {
            skipped.push(column.name.clone());
            continue;
        }

        let old = rounded_integers(&column.values, &column.name)?;
        // Column-level decision: a column that was never negative stays so.
        let clamp = old.iter().all(|&v| v >= 0);
        let mut new = Vec::with_capacity(old.len());
        for (row, &oldint) in old.iter().enumerate() {
            let factor = mean + std_dev * normal.standard(rng);
            let addon = to_i64((oldint as f64 * factor).round_ties_even()).ok_or_else(|| {
                PipelineError::Overflow {
                    column: column.name.clone(),
                    row,
                }
            })?;
            let raw = oldint
                .checked_add(addon)
                .ok_or_else(|| PipelineError::Overflow {
                    column: column.name.clone(),
                    row,
                })?;
            new.push(if clamp { raw.max(0) } else { raw });
        }

        debug!(
            column = %column.name,
            old_min = ?old.iter().min(),
            new_min = ?new.iter().min(),
            "randomized"
        );
        column.values = Values::Int(new);
        randomized.push(column.name.clone());
    }

    debug!(skips = skipped.len(), "number of variable randomization skips");
    Ok((randomized, skipped))
}

/// Recomputes dependent columns from their already-randomized sources.
/// Constraints are applied in order, so a later one sees earlier results.
pub fn repair_constraints(dataset: &mut Dataset, constraints: &[Constraint]) -> Result<()> {
    for constraint in constraints {
        let repaired = match constraint {
            Constraint::Sum {
                total,
                part_a,
                part_b,
            } => {
                let a = source_column(dataset, part_a)?;
                let b = source_column(dataset, part_b)?;
                let values = match (a, b) {
                    (Values::Int(a), Values::Int(b)) => {
                        let mut sum = Vec::with_capacity(a.len());
                        for (row, (x, y)) in a.iter().zip(b).enumerate() {
                            let v = x.checked_add(*y).ok_or_else(|| PipelineError::Overflow {
                                column: total.clone(),
                                row,
                            })?;
                            sum.push(v);
                        }
                        Values::Int(sum)
                    }
                    (a, b) => Values::Float(
                        a.to_f64_vec()
                            .iter()
                            .zip(b.to_f64_vec())
                            .map(|(x, y)| x + y)
                            .collect(),
                    ),
                };
                (total, values)
            }
            Constraint::AtLeast { column, floor } => {
                let current = source_column(dataset, column)?;
                let lower = source_column(dataset, floor)?;
                let values = match (current, lower) {
                    (Values::Int(c), Values::Int(l)) => {
                        Values::Int(c.iter().zip(l).map(|(x, y)| (*x).max(*y)).collect())
                    }
                    (c, l) => Values::Float(
                        c.to_f64_vec()
                            .iter()
                            .zip(l.to_f64_vec())
                            .map(|(x, y)| x.max(y))
                            .collect(),
                    ),
                };
                (column, values)
            }
        };
        let (target, values) = repaired;
        dataset.set_column(target, values)?;
    }
    Ok(())
}

/// Draws `size` distinct rows. Output rows are in draw order.
pub fn sample_rows<R: Rng + ?Sized>(dataset: &Dataset, size: usize, rng: &mut R) -> Result<Dataset> {
    let available = dataset.row_count();
    if size == 0 || size > available {
        return Err(PipelineError::SampleSizeOutOfRange {
            requested: size,
            available,
        });
    }
    let indices = rand::seq::index::sample(rng, available, size).into_vec();
    Ok(dataset.take_rows(&indices))
}

/// Overwrites the identifier column with `1..=n` in row order.
pub fn assign_identifiers(dataset: &mut Dataset, id_column: &str) -> Result<()> {
    let ids = (1..=dataset.row_count() as i64).collect();
    dataset.set_column(id_column, Values::Int(ids))?;
    Ok(())
}

fn source_column<'a>(dataset: &'a Dataset, name: &str) -> Result<&'a Values> {
    dataset.column(name).ok_or_else(|| {
        PipelineError::Config(ConfigError::MissingColumn {
            role: ColumnRole::Constraint,
            name: name.to_string(),
        })
    })
}

fn rounded_integers(values: &Values, column: &str) -> Result<Vec<i64>> {
    match values {
        Values::Int(v) => Ok(v.clone()),
        Values::Float(v) => v
            .iter()
            .enumerate()
            .map(|(row, x)| {
                to_i64(x.round_ties_even()).ok_or_else(|| PipelineError::Overflow {
                    column: column.to_string(),
                    row,
                })
            })
            .collect(),
    }
}

fn to_i64(x: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    (x.is_finite() && (-BOUND..BOUND).contains(&x)).then_some(x as i64)
}

/// Box-Muller standard normals, caching the second variate of each pair.
#[derive(Default)]
struct NormalSampler {
    cached: Option<f64>,
}

impl NormalSampler {
    fn standard<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        if let Some(z) = self.cached.take() {
            return z;
        }

        let u1: f64 = Standard.sample(rng);
        let u2: f64 = Standard.sample(rng);
        let r = (-2.0 * u1.max(1e-12).ln()).sqrt();
        let theta = 2.0 * PI * u2;

        self.cached = Some(r * theta.sin());
        r * theta.cos()
    }
}
