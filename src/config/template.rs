//! Starter configuration files.

use std::path::Path;

use tracing::info;

use crate::error::Result;

const AGENT_TEMPLATE: [(&str, &str, &str, u32); 4] = [
    (
        "Tit-for-Tat",
        "You are a cooperative agent that starts by cooperating and then mirrors your opponent's previous move. Value reciprocity and fairness.",
        "gpt-4",
        2,
    ),
    (
        "Always Cooperate",
        "You are an altruistic agent that always seeks mutual benefit. Prioritize collective success over individual gain.",
        "gpt-4",
        1,
    ),
    (
        "Always Defect",
        "You are a self-interested agent focused on maximizing your own payoff. Prioritize individual success.",
        "gpt-4",
        1,
    ),
    (
        "Random",
        "You make decisions based on varied considerations. Sometimes cooperate, sometimes compete, based on the specific situation.",
        "gpt-4",
        2,
    ),
];

const EXPERIMENT_TEMPLATE: [(&str, &str, &str); 10] = [
    ("avg_rounds", "5", "Average number of rounds per pairing"),
    (
        "rounds_fixed",
        "true",
        "Whether rounds are fixed (true) or drawn from a Poisson distribution (false)",
    ),
    ("total_pairings", "100", "Total number of pairings to run"),
    (
        "allow_gossip",
        "true",
        "Whether agents can share information about others after pairings",
    ),
    (
        "memory_limit",
        "500",
        "Maximum characters of memory about each other agent",
    ),
    (
        "max_communication_rounds",
        "3",
        "Maximum back-and-forth messages before the move decision",
    ),
    (
        "game_proportions",
        "pd:40,sh:30,hd:20,coord:10",
        "Relative weights of game types (pd=prisoners dilemma, sh=stag hunt, hd=hawk-dove, coord=coordination)",
    ),
    (
        "game_varies_across_pairings",
        "true",
        "If false, one game type is held for every round of a pairing; if true, it is drawn each round",
    ),
    (
        "allow_thinking",
        "true",
        "Whether agents can use <thinking> tags for private thoughts",
    ),
    (
        "scenario_varies_across_rounds",
        "true",
        "If false, a pairing reuses the same scenario for a given game type",
    ),
];

/// Write an example roster CSV.
pub fn write_agent_template(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["strategy_name", "system_prompt", "model", "frequency"])?;
    for (name, prompt, model, frequency) in AGENT_TEMPLATE {
        let frequency = frequency.to_string();
        wtr.write_record([name, prompt, model, frequency.as_str()])?;
    }
    wtr.flush()?;
    info!("Saved agent template to {}", path.display());
    Ok(())
}

/// Write an experiment CSV listing every parameter with its default and a
/// description.
pub fn write_experiment_template(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["parameter", "value", "description"])?;
    for row in EXPERIMENT_TEMPLATE {
        wtr.write_record([row.0, row.1, row.2])?;
    }
    wtr.flush()?;
    info!("Saved experiment template to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_agents, ExperimentConfig};
    use crate::game::GameType;

    #[test]
    fn test_templates_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let agents = dir.path().join("agents_template.csv");
        let experiment = dir.path().join("experiment_template.csv");
        write_agent_template(&agents).unwrap();
        write_experiment_template(&experiment).unwrap();

        let specs = load_agents(&agents).unwrap();
        assert_eq!(specs.len(), 4);
        assert_eq!(specs.iter().map(|s| s.frequency).sum::<u32>(), 6);

        let config = ExperimentConfig::load(&experiment).unwrap();
        assert_eq!(config.avg_rounds, 5);
        assert!((config.game_proportions.weight(GameType::StagHunt) - 0.3).abs() < 1e-9);
    }
}
