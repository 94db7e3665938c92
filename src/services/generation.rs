//! Question sampling and slot assignment for multi-variant test generation.
//!
//! Everything here is pure: the caller loads pool contents from the database
//! and supplies the random source, so a seeded RNG gives a reproducible plan.

use std::collections::{BTreeMap, HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::dto::test_dto::QuestionSelection;
use crate::error::{Error, Result};

/// Question ids available in each pool, keyed by pool id.
pub type PoolInventory = HashMap<i64, Vec<i64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub position: i32,
    pub question_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPlan {
    pub variant: String,
    /// Sorted by position.
    pub placements: Vec<Placement>,
}

impl VariantPlan {
    pub fn question_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.placements.iter().map(|p| p.question_id)
    }
}

/// Rejects non-positive positions and any position requested twice, whether
/// within one selection or across selections.
pub fn check_positions(selections: &[QuestionSelection]) -> Result<()> {
    let mut seen = HashSet::new();
    for selection in selections {
        for &position in &selection.positions {
            if position < 1 {
                return Err(Error::BadRequest(format!(
                    "Invalid position {}; positions start at 1.",
                    position
                )));
            }
            if !seen.insert(position) {
                return Err(Error::BadRequest(format!(
                    "Duplicate position {} specified across question selections.",
                    position
                )));
            }
        }
    }
    Ok(())
}

/// Every pool must hold enough questions for all selections that draw from it.
pub fn check_availability(selections: &[QuestionSelection], inventory: &PoolInventory) -> Result<()> {
    let mut demand: BTreeMap<i64, Vec<i32>> = BTreeMap::new();
    for selection in selections {
        demand
            .entry(selection.question_pool)
            .or_default()
            .extend(selection.positions.iter().copied());
    }

    for (pool_id, positions) in demand {
        let available = inventory
            .get(&pool_id)
            .ok_or_else(|| Error::NotFound(format!("Question pool {} not found", pool_id)))?;
        if available.len() < positions.len() {
            return Err(Error::BadRequest(format!(
                "Not enough questions in question pool {} to fill positions {:?}",
                pool_id, positions
            )));
        }
    }
    Ok(())
}

/// Draws `positions.len()` distinct questions per selection. Selections on the
/// same pool share one stock, so a question is never drawn twice.
fn draw<R: Rng + ?Sized>(
    selections: &[QuestionSelection],
    inventory: &PoolInventory,
    rng: &mut R,
) -> Result<Vec<Vec<i64>>> {
    let mut stock: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut draws = Vec::with_capacity(selections.len());

    for selection in selections {
        let pool_id = selection.question_pool;
        let questions = inventory
            .get(&pool_id)
            .ok_or_else(|| Error::NotFound(format!("Question pool {} not found", pool_id)))?;
        let remaining = stock.entry(pool_id).or_insert_with(|| questions.clone());

        let wanted = selection.positions.len();
        if remaining.len() < wanted {
            return Err(Error::BadRequest(format!(
                "Not enough questions in question pool {} to fill positions {:?}",
                pool_id, selection.positions
            )));
        }

        let (picked, rest) = remaining.partial_shuffle(rng, wanted);
        let picked = picked.to_vec();
        let rest = rest.to_vec();
        *remaining = rest;
        draws.push(picked);
    }

    Ok(draws)
}

/// Builds one placement plan per variant label.
///
/// The first variant places each selection's sample on its positions in the
/// order drawn. Later variants shuffle the sample within the same positions,
/// or draw a fresh sample first when `resample_per_variant` is set.
pub fn plan_variants<R: Rng + ?Sized>(
    selections: &[QuestionSelection],
    variants: &[String],
    inventory: &PoolInventory,
    resample_per_variant: bool,
    rng: &mut R,
) -> Result<Vec<VariantPlan>> {
    if variants.is_empty() {
        return Err(Error::BadRequest("At least one variant is required".into()));
    }
    if selections.is_empty() {
        return Err(Error::BadRequest(
            "At least one question selection is required".into(),
        ));
    }
    check_positions(selections)?;
    check_availability(selections, inventory)?;

    let base = draw(selections, inventory, rng)?;
    let mut plans = Vec::with_capacity(variants.len());

    for (index, variant) in variants.iter().enumerate() {
        let mut draws = if index > 0 && resample_per_variant {
            draw(selections, inventory, rng)?
        } else {
            base.clone()
        };

        let mut placements = Vec::new();
        for (selection, picked) in selections.iter().zip(draws.iter_mut()) {
            if index > 0 {
                picked.shuffle(rng);
            }
            placements.extend(
                selection
                    .positions
                    .iter()
                    .zip(picked.iter())
                    .map(|(&position, &question_id)| Placement {
                        position,
                        question_id,
                    }),
            );
        }
        placements.sort_by_key(|p| p.position);

        plans.push(VariantPlan {
            variant: variant.clone(),
            placements,
        });
    }

    Ok(plans)
}
