use super::{AnalysisError, Col, EAST, WEST};
use hoops_api::{Cell, Table};
use log::debug;
use serde::Serialize;

/// One inter-conference game, seen from the East side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EastWestRow {
    pub id: i64,
    pub east_team: String,
    pub east_score: i64,
    pub west_team: String,
    pub west_score: i64,
    pub east_minus_west: i64,
}

pub const COLUMNS: [&str; 6] =
    ["id", "east_team", "east_score", "west_team", "west_score", "east_minus_west"];

struct Side {
    team: String,
    score: i64,
}

/// Keep games with one East and one West team and orient each by conference.
/// Same-conference games, games with any other conference label and games
/// missing a score are dropped.
pub fn east_west(table: &Table) -> Result<Vec<EastWestRow>, AnalysisError> {
    let id = Col::find(table, "id")?;
    let home_conf = Col::find(table, "home_team_conference")?;
    let visitor_conf = Col::find(table, "visitor_team_conference")?;
    let home_name = Col::find(table, "home_team_full_name")?;
    let visitor_name = Col::find(table, "visitor_team_full_name")?;
    let home_score = Col::find(table, "home_team_score")?;
    let visitor_score = Col::find(table, "visitor_team_score")?;

    let mut out = Vec::new();
    for (i, row) in table.rows().iter().enumerate() {
        let home_is_east = match (home_conf.text(row), visitor_conf.text(row)) {
            (Some(EAST), Some(WEST)) => true,
            (Some(WEST), Some(EAST)) => false,
            _ => continue,
        };

        let (Some(home_pts), Some(visitor_pts)) =
            (home_score.opt_int(row, i)?, visitor_score.opt_int(row, i)?)
        else {
            debug!("skipping row {i}: score missing");
            continue;
        };
        let home = Side { team: home_name.cell(row).to_string(), score: home_pts };
        let visitor = Side { team: visitor_name.cell(row).to_string(), score: visitor_pts };
        let (east, west) = if home_is_east { (home, visitor) } else { (visitor, home) };

        out.push(EastWestRow {
            id: id.int(row, i)?,
            east_minus_west: east.score - west.score,
            east_team: east.team,
            east_score: east.score,
            west_team: west.team,
            west_score: west.score,
        });
    }
    Ok(out)
}

pub fn to_table(rows: &[EastWestRow]) -> Table {
    Table::from_rows(
        COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows.iter()
            .map(|r| {
                vec![
                    Cell::Int(r.id),
                    Cell::from(r.east_team.as_str()),
                    Cell::Int(r.east_score),
                    Cell::from(r.west_team.as_str()),
                    Cell::Int(r.west_score),
                    Cell::Int(r.east_minus_west),
                ]
            })
            .collect(),
    )
}

/// East and West score columns, paired by game.
pub fn score_columns(rows: &[EastWestRow]) -> (Vec<f64>, Vec<f64>) {
    rows.iter().map(|r| (r.east_score as f64, r.west_score as f64)).unzip()
}
