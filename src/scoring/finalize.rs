use crate::equation::{self, Bindings};
use crate::scoring::Results;
use crate::values::ValueTable;

/// Owning-context inputs to finalize that are not part of the scan itself
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalizeInputs {
    /// Death count under the configured death mode (owner or summed team)
    pub deaths: i64,
    /// The region's stored initial level
    pub initial_level: i64,
    /// The region's static handicap
    pub region_handicap: i64,
}

/// State transition Scanning → Finalizing → Completed.
///
/// Runs synchronously on the owning context after the backlog empties.
/// The underwater multiplier is applied exactly once here, not during
/// scanning, so it stays a single late-bound parameter with no rounding
/// drift across batches. The total death handicap is subtracted from the
/// raw block total before the formula is evaluated.
pub fn finalize(results: &mut Results, table: &ValueTable, inputs: FinalizeInputs) {
    if results.is_finalized() {
        debug_assert!(false, "finalize invoked twice for the same scan");
        log::error!("finalize invoked twice for the same scan; ignoring");
        return;
    }

    let raw_total = results.raw_total()
        + (results.underwater_total() as f64 * table.underwater_multiplier()).floor() as i64;

    let death_handicap = inputs.deaths * table.death_penalty();
    let effective_points = raw_total - death_handicap;

    let level_cost = table.level_cost();
    let bindings = Bindings::new()
        .set("blocks", effective_points as f64)
        .set("level_cost", level_cost as f64);

    // The formula was validated at config load; a failure here means the
    // table was built without sanitizing, so fall back the same way.
    let value = match equation::evaluate(table.formula(), &bindings) {
        Ok(value) => value,
        Err(err) => {
            log::error!(
                "level formula {:?} failed at finalize ({}); using default",
                table.formula(),
                err
            );
            equation::evaluate(crate::config::DEFAULT_FORMULA, &bindings).unwrap_or(0.0)
        }
    };

    // Fractional levels truncate toward zero: 9.5 scores level 9
    let level = value as i64 - inputs.region_handicap - inputs.initial_level;
    let points_to_next_level = level_cost - effective_points.rem_euclid(level_cost);

    results.set_final_fields(
        raw_total,
        level,
        inputs.initial_level,
        death_handicap,
        points_to_next_level,
        effective_points,
    );
}
