//! Collection frequency and truck fleet optimisation.
//!
//! For every candidate frequency the optimiser enumerates the minimal truck combinations
//! whose per-collection capacity clears the week's waste, prices each one, and keeps the
//! cheapest. The catalogue is small (two truck sizes by default), so the enumeration is
//! exhaustive over minimal covers: no cheaper covering fleet exists outside it, which also
//! makes the chosen weekly cost non-decreasing in the waste mass.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, FleetConfig};

/// Utilisation from which the fleet is considered sized by capacity rather than cost.
const TIGHT_UTILIZATION: f64 = 0.85;

/// Relative tolerance when comparing weekly costs.
const COST_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A truck type in the catalogue.
pub struct TruckSpec {
    /// Display name, e.g. "10-tonne".
    pub name: String,
    /// Payload per trip.
    pub capacity_kg: f64,
    /// Hire, maintenance and running cost per operating day.
    pub daily_operating_cost: f64,
    /// Fuel cost per kilometre driven.
    pub fuel_cost_per_km: f64,
}

impl TruckSpec {
    /// Construct a truck type.
    #[must_use]
    pub fn new<S: Into<String>>(
        name: S,
        capacity_kg: f64,
        daily_operating_cost: f64,
        fuel_cost_per_km: f64,
    ) -> Self {
        Self {
            name: name.into(),
            capacity_kg,
            daily_operating_cost,
            fuel_cost_per_km,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Number of trucks of one type in a fleet.
pub struct TruckAllocation {
    /// Truck type.
    pub truck: TruckSpec,
    /// Trucks of that type.
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
/// Weekly cost components of a plan.
pub struct CostBreakdown {
    /// Daily operating cost of every truck on every collection day.
    pub operational: f64,
    /// Fuel for the round trips to the disposal site.
    pub fuel: f64,
    /// Tonnage-proportional disposal and franchise fees.
    pub disposal_fees: f64,
    /// Crew wages.
    pub crew_salaries: f64,
    /// Administrative overhead on the subtotal.
    pub admin_overhead: f64,
    /// Weekly total.
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Constraint that determined the chosen plan.
pub enum BindingConstraint {
    /// The fleet is nearly full; more waste forces a larger plan.
    Capacity,
    /// Spare capacity is kept because it is the cheapest covering option.
    Cost,
    /// Even the largest allowed fleet cannot cover the waste.
    FleetLimit,
}

impl fmt::Display for BindingConstraint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            BindingConstraint::Capacity => "capacity",
            BindingConstraint::Cost => "cost",
            BindingConstraint::FleetLimit => "fleet limit",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Best option found for one frequency.
pub struct FrequencyOption {
    /// Collections per week.
    pub frequency_per_week: u8,
    /// Trucks in the option's fleet.
    pub vehicles: u32,
    /// Weekly capacity of the option.
    pub total_weekly_capacity_kg: f64,
    /// Weekly cost of the option.
    pub weekly_cost: f64,
    /// Whether the option covers the waste.
    pub feasible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Chosen collection frequency and fleet.
pub struct FleetPlan {
    /// Collections per week.
    pub frequency_per_week: u8,
    /// Trucks per type; types with zero trucks are omitted.
    pub trucks: Vec<TruckAllocation>,
    /// Capacity per collection times frequency.
    pub total_weekly_capacity_kg: f64,
    /// Waste the plan has to clear.
    pub weekly_waste_kg: f64,
    /// One-way distance to the disposal site used for fuel.
    pub disposal_distance_km: f64,
    /// Weekly cost components.
    pub costs: CostBreakdown,
    /// Weekly total cost.
    pub weekly_cost: f64,
    /// Capacity divided by waste; below 1 only when under-provisioned.
    pub coverage_ratio: f64,
    /// Waste divided by capacity.
    pub utilization: f64,
    /// Constraint that determined the plan.
    pub binding_constraint: BindingConstraint,
    /// Set when no allowed fleet covers the waste.
    pub under_provisioned: bool,
    /// Human-readable reason for the choice.
    pub justification: String,
    /// Best option per evaluated frequency.
    pub alternatives: Vec<FrequencyOption>,
}

impl FleetPlan {
    /// Total trucks in the fleet.
    #[must_use]
    pub fn vehicle_count(&self) -> u32 {
        self.trucks.iter().map(|allocation| allocation.count).sum()
    }

    /// Truck trips per week.
    #[must_use]
    pub fn vehicle_trips(&self) -> u32 {
        self.vehicle_count() * u32::from(self.frequency_per_week)
    }
}

/// One priced fleet for one frequency.
#[derive(Debug, Clone)]
struct Candidate {
    frequency: u8,
    counts: Vec<u32>,
    weekly_capacity: f64,
    costs: CostBreakdown,
}

impl Candidate {
    fn vehicles(&self) -> u32 {
        self.counts.iter().sum()
    }

    fn trips(&self) -> u32 {
        self.vehicles() * u32::from(self.frequency)
    }

    /// Preference order: cheaper, then fewer trips, fewer trucks, less slack.
    fn rank(&self, other: &Self) -> Ordering {
        let scale = self.costs.total.abs().max(other.costs.total.abs()).max(1.0);
        let cost_order = if (self.costs.total - other.costs.total).abs() <= COST_TOLERANCE * scale {
            Ordering::Equal
        } else {
            self.costs.total.total_cmp(&other.costs.total)
        };
        cost_order
            .then_with(|| self.trips().cmp(&other.trips()))
            .then_with(|| self.vehicles().cmp(&other.vehicles()))
            .then_with(|| self.weekly_capacity.total_cmp(&other.weekly_capacity))
    }

    fn option(&self, weekly_waste_kg: f64) -> FrequencyOption {
        FrequencyOption {
            frequency_per_week: self.frequency,
            vehicles: self.vehicles(),
            total_weekly_capacity_kg: self.weekly_capacity,
            weekly_cost: self.costs.total,
            feasible: self.weekly_capacity >= weekly_waste_kg,
        }
    }
}

/// Chooses the cheapest collection frequency and fleet that clears a zone's weekly waste.
#[derive(Debug, Clone, Copy)]
pub struct CollectionStrategyOptimizer<'cfg> {
    config: &'cfg FleetConfig,
}

impl<'cfg> CollectionStrategyOptimizer<'cfg> {
    /// Optimiser over the configured catalogue and costs.
    #[must_use]
    pub fn new(config: &'cfg FleetConfig) -> Self {
        Self { config }
    }

    /// Plan collection of `weekly_waste_kg` with a disposal site `disposal_distance_km`
    /// away (one way).
    ///
    /// When no allowed fleet covers the waste, the largest fleet at the highest frequency
    /// is returned with `under_provisioned` set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty catalogue, a truck without capacity,
    /// no candidate frequencies, or negative inputs.
    pub fn optimize(
        &self,
        weekly_waste_kg: f64,
        disposal_distance_km: f64,
    ) -> Result<FleetPlan, ConfigError> {
        self.check_inputs(weekly_waste_kg, disposal_distance_km)?;

        let mut frequencies = self.config.frequencies.clone();
        frequencies.sort_unstable();
        frequencies.dedup();

        let mut alternatives = Vec::with_capacity(frequencies.len());
        let mut best: Option<Candidate> = None;

        for frequency in frequencies.iter().copied().filter(|freq| *freq > 0) {
            let Some(candidate) =
                self.best_for_frequency(frequency, weekly_waste_kg, disposal_distance_km)
            else {
                let largest = self.largest_fleet(frequency, weekly_waste_kg, disposal_distance_km);
                alternatives.push(largest.option(weekly_waste_kg));
                continue;
            };
            alternatives.push(candidate.option(weekly_waste_kg));
            let replace = best
                .as_ref()
                .is_none_or(|current| candidate.rank(current) == Ordering::Less);
            if replace {
                best = Some(candidate);
            }
        }

        let plan = if let Some(chosen) = best {
            self.build_plan(chosen, weekly_waste_kg, disposal_distance_km, alternatives, false)
        } else {
            let top_frequency = frequencies.last().copied().unwrap_or(1);
            let largest = self.largest_fleet(top_frequency, weekly_waste_kg, disposal_distance_km);
            log::warn!(
                "Insufficient capacity: largest fleet carries {:.0} of {:.0} kg/week",
                largest.weekly_capacity,
                weekly_waste_kg
            );
            self.build_plan(largest, weekly_waste_kg, disposal_distance_km, alternatives, true)
        };

        log::debug!(
            "Fleet plan: {} x/week, {} trucks, {:.2}/week ({})",
            plan.frequency_per_week,
            plan.vehicle_count(),
            plan.weekly_cost,
            plan.binding_constraint
        );
        Ok(plan)
    }

    fn check_inputs(
        &self,
        weekly_waste_kg: f64,
        disposal_distance_km: f64,
    ) -> Result<(), ConfigError> {
        if self.config.trucks.is_empty() {
            return Err(ConfigError::Invalid("truck catalogue is empty".to_owned()));
        }
        if let Some(truck) = self
            .config
            .trucks
            .iter()
            .find(|truck| !(truck.capacity_kg.is_finite() && truck.capacity_kg > 0.0))
        {
            return Err(ConfigError::Invalid(format!(
                "truck {} has no usable capacity",
                truck.name
            )));
        }
        if !self.config.frequencies.iter().any(|freq| *freq > 0) {
            return Err(ConfigError::Invalid(
                "no collection frequency configured".to_owned(),
            ));
        }
        if !weekly_waste_kg.is_finite() || weekly_waste_kg < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "weekly waste must be non-negative, got {weekly_waste_kg}"
            )));
        }
        if !disposal_distance_km.is_finite() || disposal_distance_km < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "disposal distance must be non-negative, got {disposal_distance_km}"
            )));
        }
        Ok(())
    }

    /// Cheapest covering fleet for one frequency, if any fits within the truck limit.
    fn best_for_frequency(
        &self,
        frequency: u8,
        weekly_waste_kg: f64,
        distance_km: f64,
    ) -> Option<Candidate> {
        let per_collection = weekly_waste_kg / f64::from(frequency);
        let bounds: Vec<u32> = self
            .config
            .trucks
            .iter()
            .map(|truck| self.truck_bound(per_collection, truck.capacity_kg))
            .collect();

        let mut best: Option<Candidate> = None;
        let mut counts = Vec::with_capacity(bounds.len());
        let mut visit = |covering: &[u32]| {
            let candidate = self.price(frequency, covering, weekly_waste_kg, distance_km);
            let replace = best
                .as_ref()
                .is_none_or(|current| candidate.rank(current) == Ordering::Less);
            if replace {
                best = Some(candidate);
            }
        };
        let search = CoverSearch {
            trucks: &self.config.trucks,
            frequency: f64::from(frequency),
            weekly_waste_kg,
        };
        search.walk(&self.config.trucks, &bounds, &mut counts, 0.0, &mut visit);
        best
    }

    /// Trucks of one type that alone would clear a collection, capped by the fleet limit.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "value is clamped to 0..=max_trucks_per_type before the cast"
    )]
    fn truck_bound(&self, per_collection: f64, capacity_kg: f64) -> u32 {
        let limit = f64::from(self.config.max_trucks_per_type);
        (per_collection / capacity_kg).ceil().clamp(0.0, limit) as u32
    }

    /// Every truck type at its limit.
    fn largest_fleet(&self, frequency: u8, weekly_waste_kg: f64, distance_km: f64) -> Candidate {
        let counts = vec![self.config.max_trucks_per_type; self.config.trucks.len()];
        self.price(frequency, &counts, weekly_waste_kg, distance_km)
    }

    fn price(
        &self,
        frequency: u8,
        counts: &[u32],
        weekly_waste_kg: f64,
        distance_km: f64,
    ) -> Candidate {
        let days = f64::from(frequency);
        let round_trip_km = 2.0 * distance_km;

        let (per_collection_capacity, daily_cost, fuel_per_day, vehicles) = self
            .config
            .trucks
            .iter()
            .zip(counts)
            .fold((0.0, 0.0, 0.0, 0_u32), |acc, (truck, count)| {
                let trucks = f64::from(*count);
                (
                    acc.0 + trucks * truck.capacity_kg,
                    acc.1 + trucks * truck.daily_operating_cost,
                    acc.2 + trucks * truck.fuel_cost_per_km * round_trip_km,
                    acc.3 + count,
                )
            });

        let operational = days * daily_cost;
        let fuel = days * fuel_per_day;
        let disposal_fees = weekly_waste_kg / 1000.0 * self.config.disposal_fee_per_tonne;
        let crew_salaries = f64::from(vehicles) * self.config.crew_salary_per_truck_week;
        let subtotal = operational + fuel + disposal_fees + crew_salaries;
        let admin_overhead = subtotal * self.config.admin_overhead_rate;

        Candidate {
            frequency,
            counts: counts.to_vec(),
            weekly_capacity: per_collection_capacity * days,
            costs: CostBreakdown {
                operational,
                fuel,
                disposal_fees,
                crew_salaries,
                admin_overhead,
                total: subtotal + admin_overhead,
            },
        }
    }

    fn build_plan(
        &self,
        chosen: Candidate,
        weekly_waste_kg: f64,
        disposal_distance_km: f64,
        alternatives: Vec<FrequencyOption>,
        under_provisioned: bool,
    ) -> FleetPlan {
        let capacity = chosen.weekly_capacity;
        let coverage_ratio = if weekly_waste_kg > 0.0 {
            capacity / weekly_waste_kg
        } else {
            1.0
        };
        let utilization = if capacity > 0.0 {
            weekly_waste_kg / capacity
        } else {
            0.0
        };

        let binding_constraint = if under_provisioned {
            BindingConstraint::FleetLimit
        } else if utilization >= TIGHT_UTILIZATION {
            BindingConstraint::Capacity
        } else {
            BindingConstraint::Cost
        };

        let trucks: Vec<TruckAllocation> = self
            .config
            .trucks
            .iter()
            .zip(&chosen.counts)
            .filter(|(_, count)| **count > 0)
            .map(|(truck, count)| TruckAllocation {
                truck: truck.clone(),
                count: *count,
            })
            .collect();

        let justification = justify(
            &chosen,
            &trucks,
            weekly_waste_kg,
            utilization,
            binding_constraint,
        );

        FleetPlan {
            frequency_per_week: chosen.frequency,
            trucks,
            total_weekly_capacity_kg: capacity,
            weekly_waste_kg,
            disposal_distance_km,
            costs: chosen.costs,
            weekly_cost: chosen.costs.total,
            coverage_ratio,
            utilization,
            binding_constraint,
            under_provisioned,
            justification,
            alternatives,
        }
    }
}

/// Depth-first walk over truck counts that stops as soon as a combination covers the waste.
struct CoverSearch<'a> {
    trucks: &'a [TruckSpec],
    frequency: f64,
    weekly_waste_kg: f64,
}

impl CoverSearch<'_> {
    fn walk(
        &self,
        remaining: &[TruckSpec],
        bounds: &[u32],
        counts: &mut Vec<u32>,
        per_collection: f64,
        visit: &mut impl FnMut(&[u32]),
    ) {
        if per_collection * self.frequency >= self.weekly_waste_kg {
            // More trucks would only add cost, so the rest of the catalogue stays at zero.
            let mut covering = counts.clone();
            covering.resize(self.trucks.len(), 0);
            visit(&covering);
            return;
        }
        let (Some((truck, rest)), Some((bound, rest_bounds))) =
            (remaining.split_first(), bounds.split_first())
        else {
            return;
        };
        for count in 0..=*bound {
            counts.push(count);
            self.walk(
                rest,
                rest_bounds,
                counts,
                per_collection + f64::from(count) * truck.capacity_kg,
                visit,
            );
            counts.pop();
        }
    }
}

fn justify(
    chosen: &Candidate,
    trucks: &[TruckAllocation],
    weekly_waste_kg: f64,
    utilization: f64,
    binding: BindingConstraint,
) -> String {
    let fleet = if trucks.is_empty() {
        "no trucks".to_owned()
    } else {
        trucks
            .iter()
            .map(|allocation| format!("{} x {}", allocation.count, allocation.truck.name))
            .collect::<Vec<_>>()
            .join(" + ")
    };
    let headline = format!(
        "{} collection(s)/week with {fleet}: {:.0} kg capacity for {:.0} kg ({:.0}% utilised)",
        chosen.frequency,
        chosen.weekly_capacity,
        weekly_waste_kg,
        utilization * 100.0
    );
    let reason = match binding {
        BindingConstraint::Capacity => {
            "capacity is binding; any cheaper fleet would leave waste uncollected"
        }
        BindingConstraint::Cost => {
            "cost is binding; spare capacity is kept because no tighter fleet is cheaper"
        }
        BindingConstraint::FleetLimit => {
            "INSUFFICIENT CAPACITY: the largest allowed fleet cannot clear the weekly waste"
        }
    };
    format!("{headline}; {reason}")
}
