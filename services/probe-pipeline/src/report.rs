//! Console tables for batch results and stats.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use storage::projection::DailyStats;

/// Dives per day and mean air temperature.
pub fn daily_stats_table(stats: &[DailyStats]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Day", "Dives", "Mean air temp (°C)"]);

    for day in stats {
        table.add_row(vec![
            day.day.to_string(),
            day.dives.to_string(),
            day.mean_air_temp
                .map(|t| format!("{:.1}", t))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    let total: u64 = stats.iter().map(|d| d.dives).sum();
    table.add_row(vec!["Total".to_string(), total.to_string(), String::new()]);

    table.to_string()
}
