use crate::cli::EvaluateArgs;
use crate::config::RunConfig;
use crate::error::Result;
use rigid_flows::core::models::augmented::AugmentedData;
use rigid_flows::core::models::dataset::Dataset;
use rigid_flows::core::models::simulation_box::SimulationBox;
use rigid_flows::core::models::sites::SiteTensor;
use rigid_flows::core::models::water_model::WaterModel;
use rigid_flows::density::DensityModel;
use rigid_flows::density::target::TargetDensity;
use rigid_flows::engine::batch::BatchEvaluator;
use rigid_flows::engine::bridge::EnergyBridge;
use rigid_flows::engine::oracle::EnergyOracle;
use tracing::{info, warn};

/// Result of evaluating the model's default configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub kbt: f64,
    /// Reduced energy `U / kBT`.
    pub energy: f64,
    /// Target potential including the auxiliary term.
    pub potential: f64,
    pub max_force: f64,
    pub failed: bool,
}

pub fn run(args: EvaluateArgs) -> Result<()> {
    let config = RunConfig::load(&args.config)?
        .with_temperature(args.temperature)
        .with_error_handling(args.error_handling);

    println!("Evaluating system {}...", config.system);
    let report = evaluate(&config)?;

    if report.failed {
        warn!("The energy engine failed on the default configuration.");
        println!("Warning: the energy engine failed on the default configuration.");
    }
    println!("  kBT:              {:.6} kJ/mol", report.kbt);
    println!("  Reduced energy:   {:.6}", report.energy);
    println!("  Target potential: {:.6}", report.potential);
    println!("  Max |force|:      {:.6}", report.max_force);
    Ok(())
}

/// Evaluates the target density at the default configuration of the system's model file.
///
/// The configuration doubles as a one-frame dataset, so cutoff thresholds are anchored at it.
pub fn evaluate(config: &RunConfig) -> Result<EvaluationReport> {
    let model_path = config.system.model_path();
    info!("Loading water model from {:?}", &model_path);
    let model = WaterModel::load_from_json(&model_path)?;

    let oracle = EnergyOracle::from_model(
        &model,
        config.temperature(),
        config.error_handling,
    )?;
    let kbt = oracle.kbt();
    let bridge = EnergyBridge::new(BatchEvaluator::from_oracle(oracle));

    let box_size = model.box_vectors().diagonal();
    let simulation_box = SimulationBox::from_max(box_size)?;
    let positions = SiteTensor::configuration(model.layout(), model.positions().to_vec())?;

    info!("Computing energy and forces...");
    let output = bridge.energy_and_forces(&positions, Some(&box_size), false)?;
    let energy = output.energy.as_slice().first().copied().unwrap_or(f64::NAN);
    let max_force = output
        .forces
        .as_slice()
        .iter()
        .map(|f| f.norm())
        .fold(0.0, f64::max);

    let dataset = Dataset::new(vec![model.positions().to_vec()], vec![box_size], None)?;
    let target = TargetDensity::new(
        config.auxiliary_shape,
        bridge,
        Some(dataset),
        config.target.cutoff_threshold,
    )?;
    let sample = AugmentedData {
        pos: positions,
        aux: vec![0.0; config.auxiliary_shape],
        sign: vec![1.0; model.n_molecules()],
        simulation_box,
        force: Some(output.forces),
    };
    let potential = target.potential(&sample)?;
    info!(energy, potential, "Evaluation finished.");

    Ok(EvaluationReport {
        kbt,
        energy,
        potential,
        max_force,
        failed: !output.failed.is_empty(),
    })
}
