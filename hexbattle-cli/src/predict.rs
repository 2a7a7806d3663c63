//! Predict command - print the damage distribution for a unit pairing

use anyhow::{anyhow, Result};
use clap::Args;
use serde::Serialize;

use hexbattle_core::{DamagePrediction, RulesEngine, UnitTypeId};

use crate::AppContext;

#[derive(Args)]
pub struct PredictArgs {
    /// Attacking unit type, by id or name
    pub attacker: String,

    /// Defending unit type, by id or name
    pub defender: String,
}

#[derive(Serialize)]
struct PredictionView {
    attacker: UnitTypeId,
    defender: UnitTypeId,
    can_attack: bool,
    prediction: DamagePrediction,
}

pub fn run(args: PredictArgs, ctx: &AppContext) -> Result<()> {
    let attacker = resolve_unit_type(&ctx.rules, &args.attacker)?;
    let defender = resolve_unit_type(&ctx.rules, &args.defender)?;
    let (prediction, can_attack) = ctx.rules.combat_prediction(attacker, defender)?;

    if ctx.json {
        let view = PredictionView {
            attacker,
            defender,
            can_attack,
            prediction,
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let name = |id| {
        ctx.rules
            .unit_data(id)
            .map(|d| d.name.clone())
            .unwrap_or_default()
    };
    if !can_attack {
        println!("{} cannot attack {}", name(attacker), name(defender));
        return Ok(());
    }

    println!(
        "{} vs {}: expected damage {:.2}",
        name(attacker),
        name(defender),
        prediction.expected_damage
    );
    for band in &prediction.ranges {
        println!(
            "  {:>3}-{:<3} {:>5.1}%",
            band.min_value,
            band.max_value,
            band.probability * 100.0
        );
    }
    Ok(())
}

fn resolve_unit_type(rules: &RulesEngine, text: &str) -> Result<UnitTypeId> {
    if let Ok(id) = text.parse::<UnitTypeId>() {
        rules.unit_data(id)?;
        return Ok(id);
    }
    rules
        .unit_types()
        .into_iter()
        .find(|&id| {
            rules
                .unit_data(id)
                .is_ok_and(|d| d.name.eq_ignore_ascii_case(text))
        })
        .ok_or_else(|| anyhow!("Unknown unit type: {text}"))
}
