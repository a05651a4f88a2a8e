use crate::cli::SampleBaseArgs;
use crate::config::RunConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressBar;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rigid_flows::core::models::simulation_box::SimulationBox;
use rigid_flows::core::models::water_model::WaterModel;
use rigid_flows::density::DensityModel;
use rigid_flows::density::base::BaseDensity;
use tracing::{debug, info};

/// Statistics of the base potentials of a batch of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PotentialSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl PotentialSummary {
    fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        Some(Self {
            count: values.len(),
            mean: values.iter().sum::<f64>() / values.len() as f64,
            min,
            max,
        })
    }
}

pub fn run(args: SampleBaseArgs) -> Result<()> {
    let config = RunConfig::load(&args.config)?;
    let mut rng = match args.seed {
        Some(seed) => {
            info!("Seeding random number generator with {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    println!(
        "Drawing {} samples from the base density of {}...",
        args.num_samples, config.system
    );
    let progress = CliProgressBar::new(args.num_samples as u64, "Sampling")?;
    let summary = sample_base(&config, args.num_samples, &mut rng, &progress)?;
    progress.finish();

    println!("  Samples:        {}", summary.count);
    println!("  Mean potential: {:.6}", summary.mean);
    println!("  Min potential:  {:.6}", summary.min);
    println!("  Max potential:  {:.6}", summary.max);
    Ok(())
}

/// Draws `num_samples` states from the base density in the box of the system's model file.
pub fn sample_base(
    config: &RunConfig,
    num_samples: usize,
    rng: &mut StdRng,
    progress: &CliProgressBar,
) -> Result<PotentialSummary> {
    if num_samples == 0 {
        return Err(CliError::Argument(
            "the number of samples must be positive".to_string(),
        ));
    }

    let model_path = config.system.model_path();
    info!("Loading water model from {:?}", &model_path);
    let model = WaterModel::load_from_json(&model_path)?;
    let simulation_box = SimulationBox::from_max(model.box_vectors().diagonal())?;

    let base = BaseDensity::from_specs(
        &config.system,
        &config.base,
        simulation_box,
        config.auxiliary_shape,
    )?;

    let mut potentials = Vec::with_capacity(num_samples);
    for _ in 0..num_samples {
        let sample = base.sample(rng)?;
        potentials.push(sample.ldj);
        progress.inc();
    }
    debug!("Drew {} base samples.", potentials.len());

    PotentialSummary::from_values(&potentials)
        .ok_or_else(|| CliError::Argument("no samples were drawn".to_string()))
}
