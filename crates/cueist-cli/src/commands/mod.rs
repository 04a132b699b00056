pub mod belief;
pub mod decide;
pub mod event;
pub mod feedback;
pub mod rule;
pub mod seed;

use cueist_core::{
    Db, DecisionEngine, EngineConfig, ScheduleOptimizer, TimingModel, TimingPrior,
};

/// Open the engine over the default database with the saved configuration.
pub fn open_engine() -> Result<DecisionEngine<Db>, Box<dyn std::error::Error>> {
    let db = Db::open()?;
    let config = EngineConfig::load()?;
    Ok(DecisionEngine::with_components(
        db,
        TimingModel::new(config.timing, TimingPrior::default()),
        ScheduleOptimizer::with_config(config.optimizer),
        config.decision,
    ))
}
