use crate::analysis::{EAST, WEST, east_west, home};
use crate::stats::groups::{Group, GroupComparison, compare_groups};
use crate::stats::paired::{PairedTTest, paired_t_test};
use crate::viz::describe::{self, ColumnSummary};
use crate::viz::{PlotError, Plotter, Series};
use anyhow::Context;
use chrono::{DateTime, Utc};
use hoops_api::Table;
use hoops_api::client::FetchReport;
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const SCORE_COLUMNS: [&str; 3] = ["east_score", "west_score", "east_minus_west"];

/// Where the analysed table came from.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    Fetched(FetchReport),
    Csv { path: PathBuf },
}

#[derive(Debug, Clone, Serialize)]
pub struct ConferenceResult {
    pub conference: String,
    pub teams: usize,
    pub games: usize,
    /// Spread of home margins across the kept teams.
    pub summary: Vec<ColumnSummary>,
    pub comparison: Option<GroupComparison>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub source: Source,
    pub games: usize,
    pub east_west_games: usize,
    pub summary: Vec<ColumnSummary>,
    pub east_vs_west: Option<PairedTTest>,
    pub home_court: Vec<ConferenceResult>,
    pub images: Vec<PathBuf>,
}

impl Report {
    /// Run every filter, test and plot over `table`. Tests without enough
    /// data are logged and left out; plot and table errors abort.
    pub fn build(
        table: &Table,
        source: Source,
        plotter: &Plotter,
        top_n: Option<usize>,
    ) -> anyhow::Result<Self> {
        let mut images = Vec::new();

        let ew_rows = east_west::east_west(table)?;
        let ew_table = east_west::to_table(&ew_rows);
        let summary = if ew_rows.is_empty() {
            Vec::new()
        } else {
            describe::describe(&ew_table, Some(&SCORE_COLUMNS))?
        };

        let (east, west) = east_west::score_columns(&ew_rows);
        let east_vs_west = paired_t_test(&east, &west)
            .inspect_err(|e| warn!("skipping east vs west test: {e}"))
            .ok();

        let diffs = Series::new(
            "east_minus_west",
            ew_rows.iter().map(|r| r.east_minus_west as f64).collect(),
        );
        keep_plot(
            plotter.box_plot_pair(
                &[Series::new("east_score", east), Series::new("west_score", west)],
                std::slice::from_ref(&diffs),
                "east_vs_west_scores",
            ),
            &mut images,
        )?;
        keep_plot(plotter.density_plot(&diffs, "east_minus_west_density"), &mut images)?;

        let mut home_court = Vec::new();
        for conference in [EAST, WEST] {
            let rows = home::home_performance(table, Some(conference), top_n)?;
            let groups = Group::collect(
                rows.iter().map(|r| (r.home_team_full_name.as_str(), r.home_score_diff as f64)),
            );
            let comparison = compare_groups(&groups)
                .inspect_err(|e| warn!("skipping {conference} home-court comparison: {e}"))
                .ok();
            let summary = if rows.is_empty() {
                Vec::new()
            } else {
                describe::describe(&home::to_table(&rows), Some(&["home_score_diff"]))?
            };
            let image = format!("{}_home_court", conference.to_lowercase());
            keep_plot(plotter.ordered_box_plot(&groups, &image), &mut images)?;

            home_court.push(ConferenceResult {
                conference: conference.to_owned(),
                teams: groups.len(),
                games: rows.len(),
                summary,
                comparison,
            });
        }

        info!("report covers {} games, {} images written", table.len(), images.len());
        Ok(Self {
            generated_at: Utc::now(),
            source,
            games: table.len(),
            east_west_games: ew_rows.len(),
            summary,
            east_vs_west,
            home_court,
            images,
        })
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("writing {}", path.display()))
    }
}

/// An empty plot is not fatal; anything else is.
fn keep_plot(result: Result<PathBuf, PlotError>, images: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    match result {
        Ok(path) => images.push(path),
        Err(PlotError::Empty(name)) => warn!("nothing to plot for {name}"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Source::Fetched(fetch) => writeln!(
                f,
                "{} games from pages {}..={} ({} fetched in {}s), saved to {}",
                self.games,
                fetch.first_page,
                fetch.last_page,
                fetch.pages_fetched,
                fetch.elapsed().num_seconds(),
                fetch.output_path.display()
            )?,
            Source::Csv { path } => writeln!(f, "{} games loaded from {}", self.games, path.display())?,
        }

        writeln!(f, "\n== East vs West ({} games) ==", self.east_west_games)?;
        if !self.summary.is_empty() {
            write!(f, "{}", describe::render(&self.summary))?;
        }
        match &self.east_vs_west {
            Some(test) => writeln!(f, "{test}")?,
            None => writeln!(f, "not enough games for a paired test")?,
        }

        for result in &self.home_court {
            writeln!(
                f,
                "\n== {} home court ({} teams, {} games) ==",
                result.conference, result.teams, result.games
            )?;
            if !result.summary.is_empty() {
                write!(f, "{}", describe::render(&result.summary))?;
            }
            match &result.comparison {
                Some(comparison) => writeln!(f, "{comparison}")?,
                None => writeln!(f, "not enough games for an ANOVA")?,
            }
        }

        if !self.images.is_empty() {
            writeln!(f, "\nImages:")?;
            for image in &self.images {
                writeln!(f, "  {}", image.display())?;
            }
        }
        Ok(())
    }
}
