use super::{AnalysisError, Col};
use hoops_api::{Cell, Table};
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomeRow {
    pub home_team_full_name: String,
    /// Home score minus visitor score.
    pub home_score_diff: i64,
}

pub const COLUMNS: [&str; 2] = ["home_team_full_name", "home_score_diff"];

/// Home-court margins, one row per game, in input order. Games missing
/// either score are skipped.
///
/// `conference` keeps only games whose home team plays in it. `top_n` keeps
/// only the games of the `n` home teams with the highest mean margin.
pub fn home_performance(
    table: &Table,
    conference: Option<&str>,
    top_n: Option<usize>,
) -> Result<Vec<HomeRow>, AnalysisError> {
    let name = Col::find(table, "home_team_full_name")?;
    let home_score = Col::find(table, "home_team_score")?;
    let visitor_score = Col::find(table, "visitor_team_score")?;
    let home_conf = conference
        .map(|_| Col::find(table, "home_team_conference"))
        .transpose()?;

    let mut rows = Vec::new();
    for (i, row) in table.rows().iter().enumerate() {
        if let (Some(wanted), Some(col)) = (conference, home_conf)
            && col.text(row) != Some(wanted)
        {
            continue;
        }
        let (Some(home_pts), Some(visitor_pts)) =
            (home_score.opt_int(row, i)?, visitor_score.opt_int(row, i)?)
        else {
            debug!("skipping row {i}: score missing");
            continue;
        };
        rows.push(HomeRow {
            home_team_full_name: name.cell(row).to_string(),
            home_score_diff: home_pts - visitor_pts,
        });
    }

    if let Some(n) = top_n {
        let keep: HashSet<String> = ranked_teams(&rows).into_iter().take(n).map(|(team, _)| team).collect();
        rows.retain(|r| keep.contains(&r.home_team_full_name));
    }
    Ok(rows)
}

/// Mean home margin per team, highest first. Equal means keep team-name
/// order.
pub fn ranked_teams(rows: &[HomeRow]) -> Vec<(String, f64)> {
    let mut totals: BTreeMap<&str, (i64, usize)> = BTreeMap::new();
    for row in rows {
        let entry = totals.entry(row.home_team_full_name.as_str()).or_default();
        entry.0 += row.home_score_diff;
        entry.1 += 1;
    }
    let mut means: Vec<(String, f64)> = totals
        .into_iter()
        .map(|(team, (sum, count))| (team.to_owned(), sum as f64 / count as f64))
        .collect();
    means.sort_by(|a, b| b.1.total_cmp(&a.1));
    means
}

pub fn to_table(rows: &[HomeRow]) -> Table {
    Table::from_rows(
        COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows.iter()
            .map(|r| vec![Cell::from(r.home_team_full_name.as_str()), Cell::Int(r.home_score_diff)])
            .collect(),
    )
}
