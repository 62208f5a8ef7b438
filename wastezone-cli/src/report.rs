//! Plain-text rendering of analyses.

use std::fmt::{self, Write as _};

use wastezone_core::{
    AuditLevel, ConsensusStrategy, DisposalRoute, RouteSource, Section, ZoneAnalysis,
};

/// Render analyses one block per zone.
pub(crate) fn render(analyses: &[ZoneAnalysis]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for (index, analysis) in analyses.iter().enumerate() {
        if index > 0 {
            writeln!(out)?;
        }
        zone_block(&mut out, analysis, index)?;
    }
    Ok(out)
}

fn zone_block(out: &mut String, analysis: &ZoneAnalysis, index: usize) -> fmt::Result {
    let name = analysis
        .zone_name
        .clone()
        .unwrap_or_else(|| format!("zone #{}", index + 1));
    writeln!(
        out,
        "== {name} ({}, {}, {} income) ==",
        analysis.zone_type, analysis.settlement_density, analysis.socioeconomic_level
    )?;

    let metrics = &analysis.metrics;
    write!(
        out,
        "Area        {:.3} km2, perimeter {:.0} m, compactness {:.2}",
        metrics.area_km2(),
        metrics.perimeter_m,
        metrics.compactness
    )?;
    if analysis.irregular_shape {
        write!(out, " (irregular)")?;
    }
    writeln!(out)?;

    match &analysis.population {
        Section::Ready(population) => {
            let strategy = match population.strategy {
                ConsensusStrategy::Selected => "selected".to_owned(),
                ConsensusStrategy::Blended {
                    adjustment_factor, ..
                } => format!("blended x{adjustment_factor:.2}"),
            };
            writeln!(
                out,
                "Population  {:.0} ({} confidence, {}, {strategy})",
                population.value, population.confidence, population.primary_source
            )?;
        }
        Section::Failed { error } => writeln!(out, "Population  unavailable: {error}")?,
    }

    match &analysis.waste {
        Section::Ready(waste) => writeln!(
            out,
            "Waste       {:.1} kg/day, {:.1} kg/week, {:.1} kg/month",
            waste.daily_kg, waste.weekly_kg, waste.monthly_kg
        )?,
        Section::Failed { error } => writeln!(out, "Waste       unavailable: {error}")?,
    }

    writeln!(out, "Disposal    {}", route_line(&analysis.disposal_route))?;

    match &analysis.fleet {
        Section::Ready(plan) => {
            let trucks = plan
                .trucks
                .iter()
                .map(|allocation| format!("{} x {}", allocation.count, allocation.truck.name))
                .collect::<Vec<_>>()
                .join(", ");
            let trucks = if trucks.is_empty() {
                "no trucks".to_owned()
            } else {
                trucks
            };
            writeln!(
                out,
                "Fleet       {trucks}, {}x per week; capacity {:.0} kg/week; cost {:.2}/week",
                plan.frequency_per_week, plan.total_weekly_capacity_kg, plan.weekly_cost
            )?;
            writeln!(
                out,
                "            coverage {:.2}, bound by {}: {}",
                plan.coverage_ratio, plan.binding_constraint, plan.justification
            )?;
        }
        Section::Failed { error } => writeln!(out, "Fleet       unavailable: {error}")?,
    }

    match &analysis.revenue {
        Section::Ready(revenue) => writeln!(
            out,
            "Revenue     {:.2}/month realistic, {:.2}/month max ({}, {} buildings); potential {}",
            revenue.monthly_revenue_realistic,
            revenue.monthly_revenue_max,
            revenue.settlement_class,
            revenue.building_count,
            revenue.revenue_potential
        )?,
        Section::Failed { error } => writeln!(out, "Revenue     unavailable: {error}")?,
    }

    if !analysis.audit.is_empty() {
        writeln!(out, "Audit")?;
        for entry in &analysis.audit {
            let level = match entry.level {
                AuditLevel::Info => "info",
                AuditLevel::Warning => "warn",
                AuditLevel::Error => "error",
            };
            let source = entry.source.as_deref().unwrap_or("-");
            writeln!(
                out,
                "  [{level}] {:?}/{source}: {}",
                entry.stage, entry.message
            )?;
        }
    }
    Ok(())
}

fn route_line(route: &DisposalRoute) -> String {
    match &route.source {
        RouteSource::NotRequested => "no disposal site".to_owned(),
        RouteSource::Haversine => format!(
            "{:.1} km, ~{:.0} min (straight-line estimate)",
            route.distance_km, route.duration_min
        ),
        RouteSource::Provider { name } => format!(
            "{:.1} km, {:.0} min via {name}",
            route.distance_km, route.duration_min
        ),
    }
}
