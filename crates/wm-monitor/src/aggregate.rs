//! Overall status and the HTML sensor list

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use wm_config::DisplayOptions;

use crate::status::VariableSnapshot;

const TABLE_OPEN: &str = "<table style='width: 100%; border-collapse: collapse;'>";
const TABLE_HEADER: &str =
    "<tr><td><b>Status</b></td><td><b>Name</b></td><td><b>Bemerkung</b></td><td><b>ID</b></td></tr>";
const TABLE_SEPARATOR: &str = "<tr><td><b>&#8205;</b></td><td><b>&#8205;</b></td><td><b>&#8205;</b></td><td><b>&#8205;</b></td></tr>";
const TABLE_CLOSE: &str = "</table>";

/// Values derived from one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStatus {
    /// Any sensor in Alarm
    pub overall: bool,
    /// Name of the last Alarm sensor in name order, empty if none
    pub last_triggering_name: String,
    /// Sensor list table, empty when the list is disabled
    pub html_summary: String,
}

/// Folds a snapshot into the published status values
pub struct OverallStatusAggregator<'a> {
    display: &'a DisplayOptions,
}

impl<'a> OverallStatusAggregator<'a> {
    pub fn new(display: &'a DisplayOptions) -> Self {
        Self { display }
    }

    /// Aggregate a snapshot sorted by name
    pub fn aggregate(&self, snapshot: &[VariableSnapshot]) -> AggregateStatus {
        let last_triggering_name = snapshot
            .iter()
            .filter(|s| s.is_alarm())
            .last()
            .map(|s| s.name.clone())
            .unwrap_or_default();

        AggregateStatus {
            overall: snapshot.iter().any(VariableSnapshot::is_alarm),
            last_triggering_name,
            html_summary: self.render_html(snapshot),
        }
    }

    /// Alarm rows first, then OK rows, separated by a blank row
    pub fn render_html(&self, snapshot: &[VariableSnapshot]) -> String {
        if !self.display.alarm_sensor_list {
            return String::new();
        }

        let mut html = String::from(TABLE_OPEN);
        html.push_str(TABLE_HEADER);

        let mut alarm_rendered = false;
        if self.display.alarm_rows {
            for entry in snapshot.iter().filter(|s| s.is_alarm()) {
                push_row(&mut html, entry);
                alarm_rendered = true;
            }
        }

        if self.display.ok_rows {
            let mut ok_rows = snapshot.iter().filter(|s| !s.is_alarm()).peekable();
            if alarm_rendered && ok_rows.peek().is_some() {
                html.push_str(TABLE_SEPARATOR);
            }
            for entry in ok_rows {
                push_row(&mut html, entry);
            }
        }

        html.push_str(TABLE_CLOSE);
        html
    }
}

fn push_row(html: &mut String, entry: &VariableSnapshot) {
    let _ = write!(
        html,
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        entry.status_text, entry.name, entry.comment, entry.variable_id
    );
}
